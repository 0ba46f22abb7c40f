//! Authentication route handlers.
//!
//! Handles login, registration and logout against the REST backend. A
//! successful login stores the backend bearer token in the session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shuttle_house_core::Email;
use shuttle_house_core::checkout::normalize_phone;

use crate::api::{AccessToken, ApiError, AuthResponse, Credentials, Registration};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_current_customer, set_current_customer, take_return_path};
use crate::models::{CurrentCustomer, Flash};
use crate::routes::PageContext;
use crate::state::AppState;

/// Shortest password accepted at registration and password change.
pub const MIN_PASSWORD_LENGTH: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub password: String,
    pub password_confirm: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

/// Customer-facing text for an `?error=` code.
fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Email hoặc mật khẩu không đúng",
        "session" => "Không thể tạo phiên đăng nhập, vui lòng thử lại",
        "invalid_email" => "Email không hợp lệ",
        "missing_name" => "Vui lòng nhập họ tên",
        "invalid_phone" => "Số điện thoại phải gồm 10 chữ số và bắt đầu bằng 0",
        "password_mismatch" => "Mật khẩu xác nhận không khớp",
        "password_too_short" => "Mật khẩu phải có ít nhất 8 ký tự",
        "email_taken" => "Email đã được sử dụng",
        _ => "Đã có lỗi xảy ra, vui lòng thử lại",
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub error: Option<&'static str>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
    pub error: Option<&'static str>,
}

/// Store the authenticated customer and go where they were headed.
async fn start_session(session: &Session, auth: AuthResponse) -> Response {
    let customer = CurrentCustomer {
        id: auth.user.id,
        email: auth.user.email,
        name: auth.user.name,
        token: AccessToken::new(auth.token),
    };

    if let Err(e) = set_current_customer(session, &customer).await {
        tracing::error!("Failed to set session: {}", e);
        return Redirect::to("/auth/login?error=session").into_response();
    }

    set_sentry_user(&customer.id, Some(&customer.email));
    tracing::info!(user_id = %customer.id, "Customer logged in");

    let destination = take_return_path(session).await;
    Redirect::to(&destination).into_response()
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(ctx: PageContext, Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        ctx,
        error: query.error.as_deref().map(error_message),
    }
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let Ok(email) = Email::parse(&form.email) else {
        return Redirect::to("/auth/login?error=invalid_email").into_response();
    };
    if form.password.is_empty() {
        return Redirect::to("/auth/login?error=credentials").into_response();
    }

    let credentials = Credentials {
        email: email.into_inner(),
        password: form.password,
    };

    match state.api().login(&credentials).await {
        Ok(auth) => start_session(&session, auth).await,
        Err(ApiError::Unauthorized(_) | ApiError::Rejected(_) | ApiError::NotFound(_)) => {
            tracing::warn!("Login failed: bad credentials");
            Redirect::to("/auth/login?error=credentials").into_response()
        }
        Err(e) => {
            tracing::warn!("Login failed: {}", e);
            Redirect::to("/auth/login?error=failed").into_response()
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    ctx: PageContext,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    RegisterTemplate {
        ctx,
        error: query.error.as_deref().map(error_message),
    }
}

/// Validate the registration form into a backend request.
///
/// Returns the `?error=` code of the first failing rule.
fn validate_registration(form: RegisterForm) -> Result<Registration, &'static str> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err("missing_name");
    }
    let email = Email::parse(&form.email).map_err(|_| "invalid_email")?;

    let phone = match form.phone.trim() {
        "" => None,
        raw => Some(normalize_phone(raw).ok_or("invalid_phone")?),
    };

    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("password_too_short");
    }
    if form.password != form.password_confirm {
        return Err("password_mismatch");
    }

    Ok(Registration {
        name: name.to_string(),
        email: email.into_inner(),
        password: form.password,
        phone,
    })
}

/// Handle registration form submission.
///
/// The backend logs the new customer in straight away.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    let registration = match validate_registration(form) {
        Ok(registration) => registration,
        Err(code) => return Redirect::to(&format!("/auth/register?error={code}")).into_response(),
    };

    match state.api().register(&registration).await {
        Ok(auth) => {
            Flash::success(format!("Chào mừng {} đến với Shuttle House!", auth.user.name))
                .set(&session)
                .await;
            start_session(&session, auth).await
        }
        Err(ApiError::Rejected(message)) => {
            tracing::warn!("Registration rejected: {}", message);
            Redirect::to("/auth/register?error=email_taken").into_response()
        }
        Err(e) => {
            tracing::warn!("Registration failed: {}", e);
            Redirect::to("/auth/register?error=failed").into_response()
        }
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
///
/// Drops the stored token and destroys the session. The backend issues
/// stateless tokens, so there is nothing to revoke remotely.
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_customer(&session).await {
        tracing::error!("Failed to clear session: {}", e);
    }

    // Also destroy the entire session
    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {}", e);
    }

    clear_sentry_user();
    Redirect::to("/").into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(phone: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            name: " Trần Thị Lan ".to_string(),
            email: "Lan@Example.VN".to_string(),
            phone: phone.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_valid_registration_is_normalised() {
        let registration = validate_registration(form("+84 912 345 678", "cauLong99", "cauLong99")).unwrap();
        assert_eq!(registration.name, "Trần Thị Lan");
        assert_eq!(registration.email, "lan@example.vn");
        assert_eq!(registration.phone.as_deref(), Some("0912345678"));
    }

    #[test]
    fn test_registration_rules() {
        assert_eq!(
            validate_registration(form("", "short", "short")).unwrap_err(),
            "password_too_short"
        );
        assert_eq!(
            validate_registration(form("", "cauLong99", "cauLong98")).unwrap_err(),
            "password_mismatch"
        );
        assert_eq!(
            validate_registration(form("123", "cauLong99", "cauLong99")).unwrap_err(),
            "invalid_phone"
        );
        assert!(validate_registration(form("", "cauLong99", "cauLong99"))
            .unwrap()
            .phone
            .is_none());
    }

    #[test]
    fn test_error_codes_have_messages() {
        assert_eq!(error_message("credentials"), "Email hoặc mật khẩu không đúng");
        assert_eq!(error_message("anything"), "Đã có lỗi xảy ra, vui lòng thử lại");
    }
}

//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shuttle_house_core::checkout::normalize_phone;

use crate::api::{ApiError, PasswordChange, ProfileUpdate, User};
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{CurrentCustomer, Flash, session_keys};
use crate::routes::PageContext;
use crate::routes::auth::MIN_PASSWORD_LENGTH;
use crate::state::AppState;

/// Profile display data for templates.
#[derive(Clone, Default)]
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone().unwrap_or_default(),
            address: user.address.clone().unwrap_or_default(),
        }
    }
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub ctx: PageContext,
    pub profile: ProfileView,
    pub error: Option<String>,
}

/// Change password page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/password.html")]
pub struct PasswordTemplate {
    pub ctx: PageContext,
}

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

/// Change password form data.
#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Display account overview page.
#[instrument(skip(state, ctx, customer))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<AccountIndexTemplate, AppError> {
    let (profile, error) = match state.api().profile(&customer.token).await {
        Ok(user) => (ProfileView::from(&user), None),
        Err(ApiError::Unauthorized(_)) => return Err(AppError::SessionExpired),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch profile");
            let fallback = ProfileView {
                name: customer.name.clone(),
                email: customer.email.clone(),
                ..ProfileView::default()
            };
            (fallback, Some(e.customer_message()))
        }
    };

    Ok(AccountIndexTemplate {
        ctx,
        profile,
        error,
    })
}

/// Validate the profile form into a backend update.
fn validate_profile(form: &ProfileForm) -> Result<ProfileUpdate, &'static str> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err("Vui lòng nhập họ tên");
    }
    let phone = match form.phone.trim() {
        "" => None,
        raw => Some(
            normalize_phone(raw).ok_or("Số điện thoại phải gồm 10 chữ số và bắt đầu bằng 0")?,
        ),
    };
    let address = Some(form.address.trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    Ok(ProfileUpdate {
        name: name.to_string(),
        phone,
        address,
    })
}

/// Update name, phone and address.
#[instrument(skip(state, session, customer, form))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let update = match validate_profile(&form) {
        Ok(update) => update,
        Err(message) => {
            Flash::error(message).set(&session).await;
            return Ok(Redirect::to("/account").into_response());
        }
    };

    match state.api().update_profile(&customer.token, &update).await {
        Ok(user) => {
            // Keep the header greeting in step with the new name
            let refreshed = CurrentCustomer {
                name: user.name,
                ..customer
            };
            session
                .insert(session_keys::CURRENT_CUSTOMER, &refreshed)
                .await?;
            Flash::success("Đã cập nhật thông tin tài khoản").set(&session).await;
        }
        Err(ApiError::Rejected(message)) => {
            let message = if message.is_empty() {
                "Không thể cập nhật thông tin".to_string()
            } else {
                message
            };
            Flash::error(message).set(&session).await;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to("/account").into_response())
}

/// Display change password page.
pub async fn password_page(ctx: PageContext, RequireAuth(_customer): RequireAuth) -> impl IntoResponse {
    PasswordTemplate { ctx }
}

/// Validate the change password form.
fn validate_password_change(form: PasswordForm) -> Result<PasswordChange, &'static str> {
    if form.current_password.is_empty() {
        return Err("Vui lòng nhập mật khẩu hiện tại");
    }
    if form.new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("Mật khẩu mới phải có ít nhất 8 ký tự");
    }
    if form.new_password != form.new_password_confirm {
        return Err("Mật khẩu xác nhận không khớp");
    }
    if form.new_password == form.current_password {
        return Err("Mật khẩu mới phải khác mật khẩu hiện tại");
    }

    Ok(PasswordChange {
        current_password: form.current_password,
        new_password: form.new_password,
    })
}

/// Change the password.
#[instrument(skip(state, session, customer, form))]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<PasswordForm>,
) -> Result<Response, AppError> {
    let change = match validate_password_change(form) {
        Ok(change) => change,
        Err(message) => {
            Flash::error(message).set(&session).await;
            return Ok(Redirect::to("/account/password").into_response());
        }
    };

    match state.api().change_password(&customer.token, &change).await {
        Ok(()) => {
            tracing::info!(user_id = %customer.id, "Password changed");
            Flash::success("Đã đổi mật khẩu").set(&session).await;
            Ok(Redirect::to("/account").into_response())
        }
        Err(ApiError::Rejected(_)) => {
            Flash::error("Mật khẩu hiện tại không đúng").set(&session).await;
            Ok(Redirect::to("/account/password").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

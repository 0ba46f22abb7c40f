//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions, and the
//! middleware that ends a session once the backend rejects its token.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use tower_sessions::cookie::Key;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;
use crate::error::{SessionExpired, clear_sentry_user};
use crate::models::Flash;

use super::auth::{LOGIN_PATH, clear_current_customer};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "sh_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer over an already migrated `PostgreSQL` store.
///
/// Session cookies are signed with a key derived from the session secret.
#[must_use]
pub fn create_session_layer(
    store: PostgresStore,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore, tower_sessions::service::SignedCookie> {
    // Determine if we're in production (HTTPS)
    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(config.session_secret.expose_secret()))
}

/// Stretch the secret to the 64 bytes a cookie key needs.
fn signing_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Drop the stored customer when a handler reports an expired backend token.
///
/// Must run inside the session layer. HTMX requests get an `HX-Redirect`
/// header since HTMX would otherwise swap the login page into the fragment.
pub async fn session_expiry_middleware(session: Session, request: Request, next: Next) -> Response {
    let is_htmx = request.headers().contains_key("hx-request");
    let mut response = next.run(request).await;

    if response.extensions().get::<SessionExpired>().is_none() {
        return response;
    }

    if let Err(e) = clear_current_customer(&session).await {
        tracing::error!(error = %e, "Failed to clear expired session");
    }
    clear_sentry_user();
    Flash::info("Phiên đăng nhập đã hết hạn, vui lòng đăng nhập lại")
        .set(&session)
        .await;

    if is_htmx {
        response
            .headers_mut()
            .insert("hx-redirect", HeaderValue::from_static(LOGIN_PATH));
    }
    response
}

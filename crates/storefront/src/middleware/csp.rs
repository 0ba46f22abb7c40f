//! Per-request CSP nonce.
//!
//! The layout's scripts (HTMX loader, analytics bootstrap) carry
//! `nonce="..."`; the same value goes into the `script-src` directive built
//! by [`super::security_headers_middleware`]. Templates read it through
//! [`crate::routes::PageContext`].

use axum::{extract::Request, middleware::Next, response::Response};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// Random nonce for one response (128 bits, base64).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CspNonce(String);

impl CspNonce {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Store a fresh [`CspNonce`] in the request extensions.
///
/// Must wrap `security_headers_middleware` and the router.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(CspNonce::generate());
    next.run(request).await
}

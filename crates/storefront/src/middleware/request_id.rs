//! Request ID propagation.
//!
//! Reuses an upstream `x-request-id` (Cloudflare, Fly proxy) or mints a
//! UUID v4. The ID is recorded on the `http_request` span opened by the
//! trace layer, tagged on the Sentry scope, and echoed in the response so a
//! customer-reported error can be matched to its logs.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream ID accepted; anything longer is replaced.
const MAX_UPSTREAM_ID_LENGTH: usize = 128;

/// Upstream request ID, if present and sane.
fn upstream_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_UPSTREAM_ID_LENGTH)
        .map(String::from)
}

/// Ensure every request carries an ID through logs, Sentry and the response.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = upstream_id(request.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", request_id.as_str());

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(" cf-ray-123 "));
        assert_eq!(upstream_id(&headers).as_deref(), Some("cf-ray-123"));
    }

    #[test]
    fn test_missing_or_oversized_id_rejected() {
        assert!(upstream_id(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        let long = "x".repeat(MAX_UPSTREAM_ID_LENGTH + 1);
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&long).unwrap());
        assert!(upstream_id(&headers).is_none());
    }
}

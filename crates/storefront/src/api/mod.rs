//! REST backend client.
//!
//! # Architecture
//!
//! - One [`ApiClient`] per process, cheaply cloneable (`Arc` inside)
//! - The backend is the source of truth - no local copies of products,
//!   carts or orders; every page fetches what it renders
//! - Brand and category facet lists are cached in memory via `moka`
//!   (5 minute TTL). Product lists and carts are never cached.
//! - Customer calls carry the backend bearer token held in the session
//!
//! # Response shapes
//!
//! The backend returns either the bare resource or `{ "data": ... }`; both
//! are accepted. Errors carry `{ "message": "..." }`, which is surfaced to
//! the customer for 400/422 responses.
//!
//! # Example
//!
//! ```rust,ignore
//! use shuttle_house_storefront::api::ApiClient;
//!
//! let client = ApiClient::new(&config.backend)?;
//! let product = client.get_product("yonex-astrox-99-pro").await?;
//! ```

mod account;
mod cache;
mod cart;
mod catalog;
mod orders;
mod reviews;
pub mod types;
mod wishlist;

pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;

use crate::config::BackendConfig;

use cache::{CacheKey, CacheValue};

/// Errors that can occur when talking to the REST backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token missing, expired or rejected (401/403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend rejected the input (400/409/422); message is customer-facing.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("Backend error {status}: {message}")]
    Status { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    /// Message safe to show the customer.
    #[must_use]
    pub fn customer_message(&self) -> String {
        match self {
            Self::Rejected(message) | Self::NotFound(message) if !message.is_empty() => {
                message.clone()
            }
            Self::Unauthorized(_) => "Phiên đăng nhập đã hết hạn, vui lòng đăng nhập lại".to_string(),
            Self::RateLimited(_) => "Bạn thao tác quá nhanh, vui lòng thử lại sau".to_string(),
            _ => "Không thể kết nối tới máy chủ, vui lòng thử lại".to_string(),
        }
    }
}

/// Backend bearer token for a logged-in customer.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// `{ "data": T }` or a bare `T`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// `{ "message": "..." }` error body.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "error")]
    message: String,
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront REST backend.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("shuttle-house-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(64)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                cache,
            }),
        })
    }

    /// Build a request for `path` (which starts with `/api/`).
    fn request(&self, method: Method, path: &str, token: Option<&AccessToken>) -> RequestBuilder {
        let url = format!("{}{path}", self.inner.base_url);
        let builder = self.inner.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// Send a request and decode the (possibly enveloped) JSON body.
    #[instrument(skip(self, builder), level = "debug")]
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let text = self.send_raw(builder).await?;
        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })?;
        Ok(envelope.into_inner())
    }

    /// Send a request whose response body is irrelevant.
    async fn send_unit(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        self.send_raw(builder).await.map(|_| ())
    }

    /// Send a request, map non-success statuses to [`ApiError`], return the body text.
    async fn send_raw(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let text = response.text().await?;
        if status.is_success() {
            return Ok(text);
        }

        Err(status_error(status, &text))
    }
}

/// Map a non-success status and body to an [`ApiError`].
fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            ApiError::Rejected(message)
        }
        _ => {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            ApiError::Status {
                status: status.as_u16(),
                message,
            }
        }
    }
}

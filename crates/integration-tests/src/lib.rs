//! Integration tests for the Shuttle House storefront.
//!
//! # Running Tests
//!
//! The HTTP tests are `#[ignore]`d because they need a running storefront
//! (and the REST backend it talks to):
//!
//! ```bash
//! STOREFRONT_BASE_URL=http://localhost:3000 cargo test -p shuttle-house-integration-tests -- --ignored
//! ```
//!
//! Tests that place orders or write carts also need a customer account on
//! the backend, passed as `TEST_CUSTOMER_EMAIL` / `TEST_CUSTOMER_PASSWORD`.
//!
//! # Test Categories
//!
//! - `storefront_catalog` - Public pages, filters, headers
//! - `storefront_cart` - Login, cart, coupon and checkout guards

use reqwest::{Client, redirect::Policy};

/// Base URL of the storefront under test.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Credentials for an existing test customer, if configured.
#[must_use]
pub fn test_customer() -> Option<(String, String)> {
    let email = std::env::var("TEST_CUSTOMER_EMAIL").ok()?;
    let password = std::env::var("TEST_CUSTOMER_PASSWORD").ok()?;
    Some((email, password))
}

/// Client that keeps the session cookie and does not follow redirects,
/// so tests can assert on `Location`.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// `Location` header of a redirect response.
#[must_use]
pub fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Log `client` in as the configured test customer.
///
/// Returns `false` when no test customer is configured.
///
/// # Panics
///
/// Panics if the login request fails or is rejected.
#[allow(clippy::expect_used)]
pub async fn login(client: &Client) -> bool {
    let Some((email, password)) = test_customer() else {
        return false;
    };

    let response = client
        .post(format!("{}/auth/login", storefront_base_url()))
        .form(&[("email", email.as_str()), ("password", password.as_str())])
        .send()
        .await
        .expect("Login request failed");

    let target = location(&response).unwrap_or_default();
    assert!(
        response.status().is_redirection() && !target.starts_with("/auth/login"),
        "Login was rejected, redirected to {target}"
    );
    true
}

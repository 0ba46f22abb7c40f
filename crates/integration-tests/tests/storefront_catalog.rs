//! Integration tests for public storefront pages.
//!
//! These tests require a running storefront and REST backend.
//!
//! Run with: cargo test -p shuttle-house-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use shuttle_house_integration_tests::{client, location, storefront_base_url};

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_health_and_readiness() {
    let client = client();
    let base_url = storefront_base_url();

    let health = client.get(format!("{base_url}/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let ready = client.get(format!("{base_url}/health/ready")).send().await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_home_page_renders_in_vietnamese() {
    let response = client().get(storefront_base_url()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await.unwrap();
    assert!(body.contains(r#"<html lang="vi">"#));
    assert!(body.contains("Giỏ hàng"));
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_security_headers_present() {
    let response = client().get(storefront_base_url()).send().await.unwrap();
    let headers = response.headers();

    let csp = headers
        .get("content-security-policy")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(csp.contains("script-src 'self' 'nonce-"));
    assert_eq!(
        headers.get("x-content-type-options").and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_request_id_is_echoed() {
    let response = client()
        .get(format!("{}/health", storefront_base_url()))
        .header("x-request-id", "it-catalog-0001")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("it-catalog-0001")
    );
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_product_listing_with_filters() {
    let url = format!(
        "{}/products?sort=price&order=asc&min_price=100000&max_price=5000000&page=1",
        storefront_base_url()
    );
    let response = client().get(url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await.unwrap();
    assert!(body.contains("sản phẩm"));
    assert!(body.contains("Xóa bộ lọc"));
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_garbage_listing_query_still_renders() {
    let url = format!(
        "{}/products?page=-3&min_price=abc&sort=nonsense",
        storefront_base_url()
    );
    let response = client().get(url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_unknown_product_is_404() {
    let url = format!("{}/products/khong-ton-tai-xyz-123", storefront_base_url());
    let response = client().get(url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_order_tracking_validates_phone() {
    let url = format!(
        "{}/orders/track?code=SH0001&phone=123",
        storefront_base_url()
    );
    let response = client().get(url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await.unwrap();
    assert!(body.contains("notice--error"));
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_account_pages_require_login() {
    let client = client();
    let base_url = storefront_base_url();

    for path in ["/account", "/account/orders", "/wishlist", "/checkout"] {
        let response = client.get(format!("{base_url}{path}")).send().await.unwrap();
        assert!(response.status().is_redirection(), "{path} should redirect");
        assert!(
            location(&response).unwrap_or_default().starts_with("/auth/login"),
            "{path} should redirect to login"
        );
    }
}

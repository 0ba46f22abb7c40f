//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Home page
//! GET  /health                        - Liveness
//! GET  /health/ready                  - Readiness (database ping)
//!
//! # Products
//! GET  /products                      - Listing with filters and pagination
//! GET  /products/{slug}               - Detail (?variant=, ?qty=)
//! POST /products/{slug}/buy-now       - Add to cart, go to checkout
//! POST /products/{slug}/reviews       - Submit review (auth)
//!
//! # Cart (auth; HTMX fragments when HX-Request is set)
//! GET  /cart                          - Cart page
//! POST /cart/add                      - Add item
//! POST /cart/update                   - Change quantity
//! POST /cart/remove                   - Remove line
//! POST /cart/coupon                   - Apply coupon
//! POST /cart/coupon/remove            - Remove coupon
//! GET  /cart/count                    - Cart count badge (fragment)
//!
//! # Checkout (auth)
//! GET  /checkout                      - Shipping + payment form
//! POST /checkout                      - Place order
//! GET  /checkout/success/{id}         - Order confirmation
//! GET  /checkout/bank-transfer/{id}   - Transfer instructions
//! GET  /checkout/payment-return       - Gateway return page
//!
//! # Orders
//! GET  /orders/track                  - Public lookup by code + phone (rate limited)
//!
//! # Account (auth)
//! GET  /account                       - Profile
//! POST /account                       - Update profile
//! GET  /account/password              - Change password form
//! POST /account/password              - Change password
//! GET  /account/orders                - Order history
//! GET  /account/orders/{id}           - Order detail
//! POST /account/orders/{id}/cancel    - Cancel pending order
//! POST /account/orders/{id}/pay       - Retry online payment
//!
//! # Wishlist (auth)
//! GET  /wishlist                      - Wishlist
//! POST /wishlist/add                  - Add product
//! POST /wishlist/remove               - Remove product
//! POST /wishlist/move-to-cart         - Move product to cart
//!
//! # Auth
//! GET  /auth/login                    - Login page
//! POST /auth/login                    - Login action (rate limited)
//! GET  /auth/register                 - Register page
//! POST /auth/register                 - Register action (rate limited)
//! POST /auth/logout                   - Logout action
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod orders;
pub mod products;
pub mod wishlist;

use axum::{
    Router,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{MethodRouter, get, post},
};
use tower_sessions::Session;

use crate::middleware::{CspNonce, RateLimiterLayer, auth_rate_limiter, cart_rate_limiter};
use crate::models::{CurrentCustomer, Flash, session_keys};
use crate::state::AppState;

/// Data every full page needs for the shared layout.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// Name shown in the header when logged in.
    pub customer_name: Option<String>,
    /// One-shot notice, consumed by this render.
    pub flash: Option<Flash>,
    /// CSP nonce for inline scripts.
    pub nonce: String,
    pub ga4_measurement_id: Option<String>,
}

impl PageContext {
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.customer_name.is_some()
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let nonce = parts
            .extensions
            .get::<CspNonce>()
            .map(|n| n.value().to_string())
            .unwrap_or_default();

        let (customer_name, flash) = match parts.extensions.get::<Session>() {
            Some(session) => {
                let customer = session
                    .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
                    .await
                    .ok()
                    .flatten();
                (customer.map(|c| c.name), Flash::take(session).await)
            }
            None => (None, None),
        };

        Ok(Self {
            customer_name,
            flash,
            nonce,
            ga4_measurement_id: state.config().analytics.ga4_measurement_id.clone(),
        })
    }
}

/// Create the auth routes router.
///
/// Only the form submissions count against the auth limit; the pages do not.
pub fn auth_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();
    Router::new()
        .route("/login", limited_form(get(auth::login_page), post(auth::login), &limiter))
        .route(
            "/register",
            limited_form(get(auth::register_page), post(auth::register), &limiter),
        )
        .route("/logout", post(auth::logout))
}

/// Serve `page` freely and send `action` through `limiter`.
///
/// Clones of one layer share a single quota.
fn limited_form<S>(
    page: MethodRouter<S>,
    action: MethodRouter<S>,
    limiter: &RateLimiterLayer,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    page.merge(action.layer(limiter.clone()))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
        .route("/{slug}/buy-now", post(cart::buy_now))
        .route("/{slug}/reviews", post(products::submit_review))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    let mutations = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/coupon", post(cart::apply_coupon))
        .route("/coupon/remove", post(cart::remove_coupon))
        .layer(cart_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(mutations)
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::place))
        .route("/success/{id}", get(checkout::success))
        .route("/bank-transfer/{id}", get(checkout::bank_transfer))
        .route("/payment-return", get(checkout::payment_return))
}

/// Create the public order routes router.
///
/// Tracking takes a code and phone, so it shares the strict login limits.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/track", get(orders::track))
        .layer(auth_rate_limiter())
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index).post(account::update_profile))
        .route(
            "/password",
            get(account::password_page).post(account::change_password),
        )
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/cancel", post(orders::cancel))
        .route("/orders/{id}/pay", post(orders::pay))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::index))
        .route("/add", post(wishlist::add))
        .route("/remove", post(wishlist::remove))
        .route("/move-to-cart", post(wishlist::move_to_cart))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .nest("/account", account_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/auth", auth_routes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn login_router() -> Router {
        Router::new().route(
            "/login",
            limited_form(
                get(|| async { "page" }),
                post(|| async { "submitted" }),
                &auth_rate_limiter(),
            ),
        )
    }

    async fn send(router: &Router, method: Method) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri("/login")
            .header("x-forwarded-for", "198.51.100.9")
            .body(Body::empty())
            .unwrap();
        router.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_form_page_is_not_rate_limited() {
        let router = login_router();
        for _ in 0..20 {
            assert_eq!(send(&router, Method::GET).await, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_form_submission_is_rate_limited() {
        let router = login_router();
        let mut statuses = Vec::new();
        for _ in 0..10 {
            statuses.push(send(&router, Method::POST).await);
        }
        assert_eq!(statuses[0], StatusCode::OK);
        assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));

        // Reading the page is still fine once submissions are throttled
        assert_eq!(send(&router, Method::GET).await, StatusCode::OK);
    }
}

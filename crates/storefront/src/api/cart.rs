//! Cart and coupon endpoints.

use reqwest::Method;
use serde_json::json;
use tracing::instrument;

use shuttle_house_core::{CartItemId, Price};

use super::types::{AddCartItem, Cart, CouponValidation};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    /// Get the customer's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn get_cart(&self, token: &AccessToken) -> Result<Cart, ApiError> {
        self.send(self.request(Method::GET, "/api/cart", Some(token)))
            .await
    }

    /// Add a product (or variant) to the cart.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] if the backend refuses (e.g. stock changed).
    #[instrument(skip(self, token))]
    pub async fn add_cart_item(
        &self,
        token: &AccessToken,
        item: &AddCartItem,
    ) -> Result<Cart, ApiError> {
        let builder = self
            .request(Method::POST, "/api/cart/items", Some(token))
            .json(item);
        self.send(builder).await
    }

    /// Set the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects the quantity.
    #[instrument(skip(self, token))]
    pub async fn update_cart_item(
        &self,
        token: &AccessToken,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        let path = format!("/api/cart/items/{item_id}");
        let builder = self
            .request(Method::PUT, &path, Some(token))
            .json(&json!({ "quantity": quantity }));
        self.send(builder).await
    }

    /// Remove a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn remove_cart_item(
        &self,
        token: &AccessToken,
        item_id: CartItemId,
    ) -> Result<Cart, ApiError> {
        let path = format!("/api/cart/items/{item_id}");
        self.send(self.request(Method::DELETE, &path, Some(token)))
            .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn clear_cart(&self, token: &AccessToken) -> Result<(), ApiError> {
        self.send_unit(self.request(Method::DELETE, "/api/cart", Some(token)))
            .await
    }

    /// Ask the backend whether `code` applies to an order of `order_amount`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. An inapplicable code is not an
    /// error: it comes back as `valid: false` (or [`ApiError::Rejected`] on
    /// backends that answer 400).
    #[instrument(skip(self, token))]
    pub async fn validate_coupon(
        &self,
        token: &AccessToken,
        code: &str,
        order_amount: Price,
    ) -> Result<CouponValidation, ApiError> {
        let builder = self
            .request(Method::POST, "/api/coupons/validate", Some(token))
            .json(&json!({ "code": code, "orderAmount": order_amount.to_dong() }));
        self.send(builder).await
    }
}

//! Wishlist endpoints.

use reqwest::Method;
use tracing::instrument;

use shuttle_house_core::ProductId;

use super::types::{Product, WishlistAdd};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    /// Products on the customer's wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn wishlist(&self, token: &AccessToken) -> Result<Vec<Product>, ApiError> {
        self.send(self.request(Method::GET, "/api/wishlist", Some(token)))
            .await
    }

    /// Add a product. Adding a product twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn add_to_wishlist(
        &self,
        token: &AccessToken,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, "/api/wishlist", Some(token))
            .json(&WishlistAdd { product_id });
        match self.send_unit(builder).await {
            Err(ApiError::Rejected(message)) => {
                tracing::debug!(%message, "Product already on wishlist");
                Ok(())
            }
            other => other,
        }
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn remove_from_wishlist(
        &self,
        token: &AccessToken,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        let path = format!("/api/wishlist/{product_id}");
        self.send_unit(self.request(Method::DELETE, &path, Some(token)))
            .await
    }
}

//! Product review endpoints.

use reqwest::Method;
use tracing::instrument;

use shuttle_house_core::ProductId;

use super::types::{NewReview, Review};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    /// Reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn product_reviews(&self, product_id: ProductId) -> Result<Vec<Review>, ApiError> {
        let path = format!("/api/reviews/product/{product_id}");
        self.send(self.request(Method::GET, &path, None)).await
    }

    /// Post a review. The backend only accepts reviews from customers with a
    /// delivered order containing the product.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] with the backend's reason otherwise.
    #[instrument(skip(self, token, review), fields(product_id = %review.product_id))]
    pub async fn create_review(
        &self,
        token: &AccessToken,
        review: &NewReview,
    ) -> Result<Review, ApiError> {
        let builder = self
            .request(Method::POST, "/api/reviews", Some(token))
            .json(review);
        self.send(builder).await
    }
}

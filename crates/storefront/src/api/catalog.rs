//! Product catalog endpoints.

use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, instrument};

use shuttle_house_core::catalog::{Page, ProductFilter};

use super::cache::{CacheKey, CacheValue};
use super::types::{Facet, Product, ProductListResponse};
use super::{ApiClient, ApiError};

impl ApiClient {
    /// Fetch one page of products matching `filter`.
    ///
    /// Issues exactly one list request. When the backend answers with the
    /// unpaged variant (a bare array) the page is sliced locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(page = filter.page))]
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page_size: u32,
    ) -> Result<Page<Product>, ApiError> {
        let builder = self
            .request(Method::GET, "/api/products", None)
            .query(&filter.to_backend_query(page_size));

        let response: ProductListResponse = self.send(builder).await?;
        Ok(match response {
            ProductListResponse::Paged {
                products,
                pagination,
            } => Page::from_server(products, pagination),
            ProductListResponse::Unpaged(products) => {
                debug!(count = products.len(), "Backend returned unpaged list");
                Page::paginate_local(products, filter.page, page_size)
            }
        })
    }

    /// Get a product by its slug.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if no product has this slug.
    #[instrument(skip(self))]
    pub async fn get_product(&self, slug: &str) -> Result<Product, ApiError> {
        let path = format!("/api/products/{}", urlencoding::encode(slug));
        self.send(self.request(Method::GET, &path, None)).await
    }

    /// All brands, cached for 5 minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails on a cache miss.
    pub async fn brands(&self) -> Result<Arc<Vec<Facet>>, ApiError> {
        self.facets(CacheKey::Brands, "/api/brands").await
    }

    /// All categories, cached for 5 minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails on a cache miss.
    pub async fn categories(&self) -> Result<Arc<Vec<Facet>>, ApiError> {
        self.facets(CacheKey::Categories, "/api/categories").await
    }

    #[instrument(skip(self))]
    async fn facets(&self, key: CacheKey, path: &str) -> Result<Arc<Vec<Facet>>, ApiError> {
        if let Some(CacheValue::Facets(facets)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for facets");
            return Ok(facets);
        }

        let facets: Vec<Facet> = self.send(self.request(Method::GET, path, None)).await?;
        let facets = Arc::new(facets);

        self.inner
            .cache
            .insert(key, CacheValue::Facets(Arc::clone(&facets)))
            .await;

        Ok(facets)
    }
}

//! Cache types for backend facet lists.

use std::sync::Arc;

use super::types::Facet;

/// Cache key for facet lists.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Brands,
    Categories,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Facets(Arc<Vec<Facet>>),
}

//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use shuttle_house_core::catalog::{Page, ProductFilter, SortKey, SortOrder};

use crate::api::{ApiError, Product};
use crate::filters;
use crate::routes::PageContext;
use crate::routes::products::ProductCard;
use crate::state::AppState;

/// Products per home page shelf.
const SHELF_SIZE: u32 = 8;

/// A product shelf on the home page.
pub struct Shelf {
    pub title: &'static str,
    pub more_href: String,
    pub products: Vec<ProductCard>,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub shelves: Vec<Shelf>,
}

fn shelf(
    title: &'static str,
    filter: &ProductFilter,
    result: Result<Page<Product>, ApiError>,
) -> Option<Shelf> {
    match result {
        Ok(page) if !page.items.is_empty() => Some(Shelf {
            title,
            more_href: filter.href(),
            products: page.items.iter().map(ProductCard::from).collect(),
        }),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, shelf = title, "Failed to fetch home shelf");
            None
        }
    }
}

/// Display the home page: new arrivals and best sellers.
///
/// A shelf whose fetch fails is left out rather than failing the page.
#[instrument(skip(state, ctx))]
pub async fn home(State(state): State<AppState>, ctx: PageContext) -> HomeTemplate {
    let newest = ProductFilter::default().with_sort(SortKey::Newest, SortOrder::Desc);
    let best = ProductFilter::default().with_sort(SortKey::BestSelling, SortOrder::Desc);

    let api = state.api();
    let (newest_page, best_page) = tokio::join!(
        api.list_products(&newest, SHELF_SIZE),
        api.list_products(&best, SHELF_SIZE),
    );

    let shelves = [
        shelf("Sản phẩm mới", &newest, newest_page),
        shelf("Bán chạy nhất", &best, best_page),
    ]
    .into_iter()
    .flatten()
    .collect();

    HomeTemplate { ctx, shelves }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shelf_skips_empty_and_failed_pages() {
        let filter = ProductFilter::default().with_sort(SortKey::Newest, SortOrder::Desc);
        assert!(shelf("Mới", &filter, Ok(Page::paginate_local(Vec::new(), 1, 8))).is_none());
        assert!(shelf("Mới", &filter, Err(ApiError::RateLimited(1))).is_none());

        let product: Product = serde_json::from_str(
            r#"{"id": 1, "name": "Cầu lông Thành Công", "slug": "cau-thanh-cong", "price": "85000", "stock": 10}"#,
        )
        .unwrap();
        let shelf = shelf("Mới", &filter, Ok(Page::paginate_local(vec![product], 1, 8))).unwrap();
        assert_eq!(shelf.products.len(), 1);
        assert_eq!(shelf.products[0].price, "85.000₫");
    }
}

//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shuttle_house_core::catalog::{ListingQuery, Page, ProductFilter, SortKey, SortOrder};
use shuttle_house_core::stock::{PurchaseCheck, StockSource, clamp_quantity};
use shuttle_house_core::{Rating, VariantId};

use crate::api::{ApiError, Facet, NewReview, Product, Review};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::Flash;
use crate::routes::PageContext;
use crate::routes::cart::product_href;
use crate::state::AppState;

/// Longest review comment accepted.
const MAX_REVIEW_LENGTH: usize = 1000;

/// Sort choices offered on the listing, in display order.
const SORT_OPTIONS: [(SortKey, SortOrder, &str); 6] = [
    (SortKey::Newest, SortOrder::Desc, "Mới nhất"),
    (SortKey::BestSelling, SortOrder::Desc, "Bán chạy"),
    (SortKey::Price, SortOrder::Asc, "Giá tăng dần"),
    (SortKey::Price, SortOrder::Desc, "Giá giảm dần"),
    (SortKey::Name, SortOrder::Asc, "Tên A-Z"),
    (SortKey::Rating, SortOrder::Desc, "Đánh giá cao"),
];

// =============================================================================
// Views
// =============================================================================

/// Product tile used on listing, home and wishlist pages.
#[derive(Clone)]
pub struct ProductCard {
    pub id: i64,
    pub slug: String,
    /// Detail page link, slug already percent-encoded.
    pub href: String,
    pub name: String,
    pub brand: Option<String>,
    pub image: Option<String>,
    pub price: String,
    pub compare_at: Option<String>,
    pub in_stock: bool,
    /// Product has sizes, so "add to cart" must go through the detail page.
    pub has_variants: bool,
    pub rating: Option<String>,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i64(),
            slug: product.slug.clone(),
            href: product_href(&product.slug, None),
            name: product.name.clone(),
            brand: product.brand.as_ref().map(|b| b.name.clone()),
            image: product.primary_image().map(str::to_string),
            price: product.effective_price().display(),
            compare_at: product.compare_at_price().map(|p| p.display()),
            in_stock: product.total_stock() > 0,
            has_variants: !product.variants.is_empty(),
            rating: product
                .average_rating
                .filter(|_| product.review_count > 0)
                .map(|r| format!("{r:.1}")),
        }
    }
}

/// A filter facet entry.
pub struct FacetLink {
    pub name: String,
    pub href: String,
    pub active: bool,
}

/// A sort choice.
pub struct SortLink {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

/// A numbered pagination link.
pub struct PageLink {
    pub number: u32,
    pub href: String,
    pub current: bool,
}

/// Size choice on the detail page.
pub struct SizeOption {
    pub label: String,
    pub href: String,
    pub id: i64,
    pub selected: bool,
    pub available: bool,
}

/// Review display data.
pub struct ReviewView {
    pub author: String,
    pub stars: String,
    pub comment: String,
    pub date: String,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        Self {
            author: review.user_name.clone(),
            stars: review.rating.glyphs(),
            comment: review.comment.clone(),
            date: review.created_at.format("%d/%m/%Y").to_string(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductListTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductCard>,
    pub total_items: u64,
    pub page_links: Vec<PageLink>,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
    pub brands: Vec<FacetLink>,
    pub categories: Vec<FacetLink>,
    pub sorts: Vec<SortLink>,
    pub clear_href: Option<String>,
    pub search: String,
    pub min_price: String,
    pub max_price: String,
    /// Current filters to carry through the price form (page excluded).
    pub hidden_fields: Vec<(&'static str, String)>,
    pub error: Option<String>,
    pub retry_href: String,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub product: ProductCard,
    pub description: String,
    pub category: Option<String>,
    pub images: Vec<String>,
    pub attributes: Vec<(String, String)>,
    /// Price of the selected size, or the product price.
    pub price: String,
    pub sizes: Vec<SizeOption>,
    pub selected_variant: Option<i64>,
    pub quantity: u32,
    pub max_quantity: u32,
    pub can_purchase: bool,
    pub purchase_error: Option<String>,
    pub stock_note: Option<String>,
    pub review_count: u32,
    pub reviews: Vec<ReviewView>,
    pub reviews_error: bool,
    pub buy_now_href: String,
    pub reviews_action: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display product listing page.
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<ListingQuery>,
) -> ProductListTemplate {
    let filter = ProductFilter::from_query(&query);
    let api = state.api();

    let (products, brands, categories) = tokio::join!(
        api.list_products(&filter, state.config().page_size),
        api.brands(),
        api.categories(),
    );

    let brands = facets_or_empty(brands, "brands");
    let categories = facets_or_empty(categories, "categories");

    let (page, error) = match products {
        Ok(page) => (page, None),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch product list");
            (
                Page::paginate_local(Vec::new(), 1, 1),
                Some(e.customer_message()),
            )
        }
    };

    let page_links = page
        .page_window(5)
        .into_iter()
        .map(|number| PageLink {
            number,
            href: filter.href_for_page(number),
            current: number == page.page,
        })
        .collect();

    ProductListTemplate {
        products: page.items.iter().map(ProductCard::from).collect(),
        total_items: page.total_items,
        page_links,
        prev_href: page
            .has_previous()
            .then(|| filter.href_for_page(page.page - 1)),
        next_href: page.has_next().then(|| filter.href_for_page(page.page + 1)),
        brands: brands
            .iter()
            .map(|b| FacetLink {
                name: b.name.clone(),
                href: filter.toggle_brand(&b.slug).href(),
                active: filter.has_brand(&b.slug),
            })
            .collect(),
        categories: categories
            .iter()
            .map(|c| {
                let active = filter.category.as_deref() == Some(c.slug.as_str());
                FacetLink {
                    name: c.name.clone(),
                    href: filter
                        .with_category((!active).then_some(c.slug.as_str()))
                        .href(),
                    active,
                }
            })
            .collect(),
        sorts: SORT_OPTIONS
            .iter()
            .map(|(key, order, label)| SortLink {
                label,
                href: filter.with_sort(*key, *order).href(),
                active: filter.sort == *key && filter.order == *order,
            })
            .collect(),
        clear_href: filter
            .has_active_filters()
            .then(|| filter.cleared().href()),
        search: filter.search.clone().unwrap_or_default(),
        min_price: filter
            .min_price
            .map(|p| p.to_dong().to_string())
            .unwrap_or_default(),
        max_price: filter
            .max_price
            .map(|p| p.to_dong().to_string())
            .unwrap_or_default(),
        hidden_fields: filter
            .url_pairs()
            .into_iter()
            .filter(|(key, _)| !matches!(*key, "min_price" | "max_price" | "page"))
            .collect(),
        error,
        retry_href: filter.href(),
        ctx,
    }
}

fn facets_or_empty(result: Result<std::sync::Arc<Vec<Facet>>, ApiError>, kind: &str) -> Vec<Facet> {
    match result {
        Ok(facets) => facets.as_ref().clone(),
        Err(e) => {
            tracing::warn!(error = %e, kind, "Failed to fetch facets");
            Vec::new()
        }
    }
}

/// Detail page query: `?variant=<id>&qty=<n>`.
#[derive(Debug, Default, Deserialize)]
pub struct DetailQuery {
    pub variant: Option<String>,
    pub qty: Option<String>,
}

/// Display product detail page.
#[instrument(skip(state, ctx, query))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(slug): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Result<ProductShowTemplate, AppError> {
    let product = state.api().get_product(&slug).await?;

    add_breadcrumb("navigation", "Viewed product", Some(&[("slug", &slug)]));

    let reviews = state.api().product_reviews(product.id).await;
    let reviews_error = reviews.is_err();
    let reviews: Vec<ReviewView> = match reviews {
        Ok(reviews) => reviews.iter().map(ReviewView::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch reviews");
            Vec::new()
        }
    };

    let selected = parse_variant(query.variant.as_deref());
    let requested = query
        .qty
        .as_deref()
        .and_then(|q| q.trim().parse::<u32>().ok())
        .unwrap_or(1);

    Ok(detail_template(ctx, &product, selected, requested, reviews, reviews_error))
}

/// Build the detail page for a given selection.
fn detail_template(
    ctx: PageContext,
    product: &Product,
    selected: Option<VariantId>,
    requested: u32,
    reviews: Vec<ReviewView>,
    reviews_error: bool,
) -> ProductShowTemplate {
    let stock = product.variant_stock();
    let source = StockSource::for_product(&stock, product.stock);

    // Known variant stock bounds the stepper before the guard runs
    let available = match source {
        StockSource::Aggregate(n) => Some(n),
        StockSource::Variants(_) => selected
            .and_then(|id| product.variants.iter().find(|v| v.id == id))
            .map(|v| v.stock),
    };
    let quantity = available.map_or(requested.max(1), |n| clamp_quantity(requested, n));

    let check = PurchaseCheck::evaluate(source, selected, quantity);
    let (can_purchase, purchase_error) = match &check {
        Ok(_) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };
    let stock_note = available
        .filter(|n| (1..=5).contains(n))
        .map(|n| format!("Chỉ còn {n} sản phẩm"));

    let sizes = product
        .variants
        .iter()
        .map(|v| SizeOption {
            label: v.size.clone(),
            href: format!("{}&qty={quantity}", product_href(&product.slug, Some(v.id))),
            id: v.id.as_i64(),
            selected: selected == Some(v.id),
            available: v.stock > 0,
        })
        .collect();

    let card = ProductCard::from(product);
    ProductShowTemplate {
        buy_now_href: format!("{}/buy-now", card.href),
        reviews_action: format!("{}/reviews", card.href),
        ctx,
        product: card,
        description: product.description.clone(),
        category: product.category.as_ref().map(|c| c.name.clone()),
        images: product.images.clone(),
        attributes: product
            .attributes
            .iter()
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect(),
        price: product.price_for(selected).display(),
        sizes,
        selected_variant: selected.map(|id| id.as_i64()),
        quantity,
        max_quantity: available.unwrap_or(quantity).max(1),
        can_purchase,
        purchase_error,
        stock_note,
        review_count: product.review_count,
        reviews,
        reviews_error,
    }
}

/// Parse an optional variant ID from a query or form field.
pub(crate) fn parse_variant(raw: Option<&str>) -> Option<VariantId> {
    raw.filter(|s| !s.trim().is_empty())
        .and_then(|s| s.parse::<VariantId>().ok())
}

/// Review form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub rating: String,
    #[serde(default)]
    pub comment: String,
}

/// Submit a review (requires auth).
#[instrument(skip(state, session, customer, form))]
pub async fn submit_review(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(slug): Path<String>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, AppError> {
    let back = format!("{}#reviews", product_href(&slug, None));

    let rating = form
        .rating
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|n| Rating::new(n).ok());
    let Some(rating) = rating else {
        Flash::error("Vui lòng chọn số sao từ 1 đến 5").set(&session).await;
        return Ok(Redirect::to(&back).into_response());
    };

    let comment = form.comment.trim().to_string();
    if comment.chars().count() > MAX_REVIEW_LENGTH {
        Flash::error(format!("Nhận xét tối đa {MAX_REVIEW_LENGTH} ký tự"))
            .set(&session)
            .await;
        return Ok(Redirect::to(&back).into_response());
    }

    let product = state.api().get_product(&slug).await?;
    let review = NewReview {
        product_id: product.id,
        rating,
        comment,
    };

    match state.api().create_review(&customer.token, &review).await {
        Ok(_) => Flash::success("Cảm ơn bạn đã đánh giá sản phẩm!").set(&session).await,
        Err(ApiError::Rejected(message)) => {
            let message = if message.is_empty() {
                "Bạn chỉ có thể đánh giá sản phẩm đã mua và nhận hàng".to_string()
            } else {
                message
            };
            Flash::error(message).set(&session).await;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to(&back).into_response())
}

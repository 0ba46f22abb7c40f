//! Wishlist route handlers.
//!
//! Add and remove answer HTMX with the refreshed heart button; plain form
//! posts redirect back.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shuttle_house_core::ProductId;

use crate::api::ApiError;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::Flash;
use crate::routes::PageContext;
use crate::routes::cart::{AddOutcome, add_product_to_cart, is_htmx_request, product_href};
use crate::routes::products::ProductCard;
use crate::state::AppState;

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "wishlist/index.html")]
pub struct WishlistTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductCard>,
    pub error: Option<String>,
}

/// Heart toggle fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/wishlist_button.html")]
pub struct WishlistButtonTemplate {
    pub product_id: i64,
    pub in_wishlist: bool,
}

/// Wishlist form data.
#[derive(Debug, Deserialize)]
pub struct WishlistForm {
    pub product_id: String,
    /// Page to return to for non-HTMX posts.
    pub back: Option<String>,
}

/// Move-to-cart form data.
#[derive(Debug, Deserialize)]
pub struct MoveToCartForm {
    pub slug: String,
}

fn parse_product_id(raw: &str) -> Result<ProductId, AppError> {
    raw.parse::<ProductId>()
        .map_err(|_| AppError::BadRequest("Sản phẩm không hợp lệ".to_string()))
}

/// Redirect target for non-HTMX posts; only local paths are honoured.
fn back_path(back: Option<&str>) -> &str {
    back.filter(|b| b.starts_with('/') && !b.starts_with("//"))
        .unwrap_or("/wishlist")
}

/// Display the wishlist.
#[instrument(skip(state, ctx, customer))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<WishlistTemplate, AppError> {
    let (products, error) = match state.api().wishlist(&customer.token).await {
        Ok(products) => (products.iter().map(ProductCard::from).collect(), None),
        Err(ApiError::Unauthorized(_)) => return Err(AppError::SessionExpired),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch wishlist");
            (Vec::new(), Some(e.customer_message()))
        }
    };

    Ok(WishlistTemplate {
        ctx,
        products,
        error,
    })
}

/// Add a product to the wishlist.
#[instrument(skip(state, session, customer, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<WishlistForm>,
) -> Result<Response, AppError> {
    let product_id = parse_product_id(&form.product_id)?;
    state
        .api()
        .add_to_wishlist(&customer.token, product_id)
        .await?;

    if is_htmx_request(&headers) {
        return Ok(WishlistButtonTemplate {
            product_id: product_id.as_i64(),
            in_wishlist: true,
        }
        .into_response());
    }

    Flash::success("Đã thêm vào danh sách yêu thích").set(&session).await;
    Ok(Redirect::to(back_path(form.back.as_deref())).into_response())
}

/// Remove a product from the wishlist.
#[instrument(skip(state, session, customer, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<WishlistForm>,
) -> Result<Response, AppError> {
    let product_id = parse_product_id(&form.product_id)?;
    match state
        .api()
        .remove_from_wishlist(&customer.token, product_id)
        .await
    {
        // Already gone
        Ok(()) | Err(ApiError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    if is_htmx_request(&headers) {
        return Ok(WishlistButtonTemplate {
            product_id: product_id.as_i64(),
            in_wishlist: false,
        }
        .into_response());
    }

    Flash::info("Đã xóa khỏi danh sách yêu thích").set(&session).await;
    Ok(Redirect::to(back_path(form.back.as_deref())).into_response())
}

/// Move a product from the wishlist into the cart.
///
/// Products sold in sizes need a size first, so those go to the product page.
#[instrument(skip(state, session, customer))]
pub async fn move_to_cart(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<MoveToCartForm>,
) -> Result<Response, AppError> {
    let product = state.api().get_product(&form.slug).await?;

    if !product.variants.is_empty() {
        Flash::info("Vui lòng chọn kích cỡ trước khi thêm vào giỏ hàng")
            .set(&session)
            .await;
        return Ok(Redirect::to(&product_href(&product.slug, None)).into_response());
    }

    match add_product_to_cart(&state, &session, &customer, &product, None, 1).await? {
        AddOutcome::Added { coupon, .. } => {
            if let Err(e) = state
                .api()
                .remove_from_wishlist(&customer.token, product.id)
                .await
            {
                tracing::warn!(product_id = %product.id, error = %e, "Failed to remove moved product from wishlist");
            }
            let message = match coupon.notice {
                Some(notice) => format!("Đã chuyển {} vào giỏ hàng. {notice}", product.name),
                None => format!("Đã chuyển {} vào giỏ hàng", product.name),
            };
            Flash::success(message).set(&session).await;
        }
        AddOutcome::Blocked { message } => {
            Flash::error(message).set(&session).await;
        }
    }

    Ok(Redirect::to("/wishlist").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_path_only_local() {
        assert_eq!(back_path(Some("/products/vot-yonex")), "/products/vot-yonex");
        assert_eq!(back_path(Some("//evil.example")), "/wishlist");
        assert_eq!(back_path(Some("https://evil.example")), "/wishlist");
        assert_eq!(back_path(None), "/wishlist");
    }
}

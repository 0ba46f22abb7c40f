//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads;
//! without JavaScript the same forms post normally and redirect back. The
//! cart itself lives in the backend, keyed by the customer's token, so a
//! customer must be logged in to have one.
//!
//! Every mutation re-validates the applied coupon against the new subtotal.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shuttle_house_core::cart::{AppliedCoupon, CartTotals};
use shuttle_house_core::stock::{PurchaseCheck, StockSource};
use shuttle_house_core::{CartItemId, Price, VariantId};

use crate::api::{AccessToken, AddCartItem, ApiError, Cart, CartItem, Product};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::session::{applied_coupon, clear_coupon, store_coupon};
use crate::models::{CurrentCustomer, Flash, FlashKind};
use crate::routes::PageContext;
use crate::routes::products::parse_variant;
use crate::services::coupon::{self, CouponApi, CouponError, Revalidation};
use crate::state::AppState;

/// HTMX event fired after any cart change; the header badge listens for it.
const CART_UPDATED: (&str, &str) = ("HX-Trigger", "cart-updated");

/// Upper bound for the quantity stepper when the backend does not report stock.
const DEFAULT_MAX_QUANTITY: u32 = 99;

// =============================================================================
// Views
// =============================================================================

/// Cart item display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub id: i64,
    /// Product page link, slug already percent-encoded.
    pub href: String,
    pub name: String,
    pub size: Option<String>,
    pub image: Option<String>,
    pub unit_price: String,
    pub line_total: String,
    pub quantity: u32,
    pub max_quantity: u32,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        use shuttle_house_core::cart::PricedLine;

        Self {
            id: item.id.as_i64(),
            href: product_href(&item.product.slug, None),
            name: item.product.name.clone(),
            size: item.variant.as_ref().map(|v| v.size.clone()),
            image: item.product.image.clone(),
            unit_price: item.price.display(),
            line_total: item.line_total().display(),
            quantity: item.quantity,
            max_quantity: item.stock.unwrap_or(DEFAULT_MAX_QUANTITY).max(item.quantity),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub total: String,
    pub item_count: u32,
    pub coupon_code: Option<String>,
}

impl CartView {
    /// Derive display figures; the coupon discount is clamped to the subtotal.
    #[must_use]
    pub fn build(cart: &Cart, coupon: Option<&AppliedCoupon>) -> Self {
        let totals = CartTotals::compute(&cart.items, coupon.map(|c| c.discount));
        Self {
            items: cart.items.iter().map(CartItemView::from).collect(),
            subtotal: totals.subtotal.display(),
            discount: (!totals.discount.is_zero()).then(|| totals.discount.display()),
            total: totals.total.display(),
            item_count: totals.item_count,
            coupon_code: coupon.map(|c| c.code.to_string()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Subtotal of the backend cart.
#[must_use]
pub fn subtotal(cart: &Cart) -> Price {
    CartTotals::compute(&cart.items, None).subtotal
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
    pub notice: Option<Flash>,
    pub error: Option<String>,
}

/// Cart panel fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_panel.html")]
pub struct CartPanelTemplate {
    pub cart: CartView,
    pub notice: Option<Flash>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Inline notice fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/notice.html")]
pub struct NoticeTemplate {
    pub notice: Flash,
}

// =============================================================================
// Helpers
// =============================================================================

/// Whether the request was issued by HTMX.
pub(crate) fn is_htmx_request(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// Parse a quantity field, defaulting to 1 when blank.
pub(crate) fn parse_quantity(raw: Option<&str>) -> Option<u32> {
    match raw.map(str::trim) {
        None | Some("") => Some(1),
        Some(s) => s.parse::<u32>().ok(),
    }
}

/// Coupon after a cart read or mutation.
#[derive(Debug, Default)]
pub(crate) struct CouponState {
    pub coupon: Option<AppliedCoupon>,
    /// Set when the coupon was just dropped.
    pub notice: Option<String>,
}

/// Bring the session coupon in line with `subtotal`.
///
/// With `force` the backend is always asked (after a mutation); otherwise
/// only when the subtotal moved since the last validation.
pub(crate) async fn refresh_coupon<A: CouponApi>(
    api: &A,
    session: &Session,
    token: &AccessToken,
    subtotal: Price,
    force: bool,
) -> Result<CouponState, AppError> {
    let Some(applied) = applied_coupon(session).await else {
        return Ok(CouponState::default());
    };
    if !force && !applied.is_stale_for(subtotal) {
        return Ok(CouponState {
            coupon: Some(applied),
            notice: None,
        });
    }

    match coupon::revalidate(api, token, &applied, subtotal).await? {
        Revalidation::Kept(coupon) => {
            store_coupon(session, &coupon).await?;
            Ok(CouponState {
                coupon: Some(coupon),
                notice: None,
            })
        }
        Revalidation::Dropped { notice } => {
            clear_coupon(session).await?;
            Ok(CouponState {
                coupon: None,
                notice: Some(notice),
            })
        }
    }
}

/// Result of the add-to-cart guard plus backend call.
pub(crate) enum AddOutcome {
    Added { cart: Cart, coupon: CouponState },
    /// Blocked before or by the backend; `message` is customer-facing.
    Blocked { message: String },
}

/// Validate the selection against stock, then add it to the backend cart.
pub(crate) async fn add_product_to_cart(
    state: &AppState,
    session: &Session,
    customer: &CurrentCustomer,
    product: &Product,
    variant: Option<VariantId>,
    quantity: u32,
) -> Result<AddOutcome, AppError> {
    let stock = product.variant_stock();
    let source = StockSource::for_product(&stock, product.stock);
    let check = match PurchaseCheck::evaluate(source, variant, quantity) {
        Ok(check) => check,
        Err(e) => {
            return Ok(AddOutcome::Blocked {
                message: e.to_string(),
            });
        }
    };

    let item = AddCartItem {
        product_id: product.id,
        variant_id: check.variant,
        quantity: check.quantity,
    };
    let cart = match state.api().add_cart_item(&customer.token, &item).await {
        Ok(cart) => cart,
        Err(ApiError::Rejected(message)) => {
            return Ok(AddOutcome::Blocked {
                message: non_empty_or(message, "Không thể thêm sản phẩm vào giỏ hàng"),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let product_id = product.id.to_string();
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", &product_id)]));
    tracing::info!(product_id = %product.id, quantity = check.quantity, "Added to cart");

    let coupon = refresh_coupon(state.api(), session, &customer.token, subtotal(&cart), true).await?;
    Ok(AddOutcome::Added { cart, coupon })
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

/// Detail page URL for a product with an optional size selected.
pub(crate) fn product_href(slug: &str, variant: Option<VariantId>) -> String {
    let slug = urlencoding::encode(slug);
    match variant {
        Some(id) => format!("/products/{slug}?variant={id}"),
        None => format!("/products/{slug}"),
    }
}

/// Respond with a notice: a fragment for HTMX, a flash + redirect otherwise.
async fn notice_response(
    htmx: bool,
    session: &Session,
    notice: Flash,
    back: &str,
    cart_changed: bool,
) -> Response {
    if htmx {
        let fragment = NoticeTemplate { notice };
        if cart_changed {
            (AppendHeaders([CART_UPDATED]), fragment).into_response()
        } else {
            fragment.into_response()
        }
    } else {
        notice.set(session).await;
        Redirect::to(back).into_response()
    }
}

/// Re-render the cart panel (HTMX) or redirect to the cart page.
async fn cart_panel_response(
    htmx: bool,
    session: &Session,
    cart: &Cart,
    coupon: CouponState,
    notice: Option<Flash>,
) -> Response {
    let notice = coupon.notice.map(Flash::info).or(notice);
    if htmx {
        (
            AppendHeaders([CART_UPDATED]),
            CartPanelTemplate {
                cart: CartView::build(cart, coupon.coupon.as_ref()),
                notice,
            },
        )
            .into_response()
    } else {
        if let Some(notice) = notice {
            notice.set(session).await;
        }
        Redirect::to("/cart").into_response()
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_slug: String,
    pub variant_id: Option<String>,
    pub quantity: Option<String>,
}

/// Buy-now form data.
#[derive(Debug, Deserialize)]
pub struct BuyNowForm {
    pub variant_id: Option<String>,
    pub quantity: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: String,
    pub quantity: String,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: String,
}

/// Coupon form data.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    pub code: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, session, ctx, customer))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<CartShowTemplate, AppError> {
    let cart = match state.api().get_cart(&customer.token).await {
        Ok(cart) => cart,
        Err(ApiError::Unauthorized(_)) => return Err(AppError::SessionExpired),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch cart");
            return Ok(CartShowTemplate {
                ctx,
                cart: CartView::build(&Cart::default(), None),
                notice: None,
                error: Some(e.customer_message()),
            });
        }
    };

    let coupon = refresh_coupon(state.api(), &session, &customer.token, subtotal(&cart), false).await?;
    let notice = coupon.notice.map(Flash::info).or_else(|| ctx.flash.take());

    Ok(CartShowTemplate {
        ctx,
        cart: CartView::build(&cart, coupon.coupon.as_ref()),
        notice,
        error: None,
    })
}

/// Add item to cart.
///
/// Runs the variant/stock guard before calling the backend. HTMX callers get
/// a notice fragment and a `cart-updated` trigger.
#[instrument(skip(state, session, customer, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response, AppError> {
    let htmx = is_htmx_request(&headers);
    let variant = parse_variant(form.variant_id.as_deref());
    let back = product_href(&form.product_slug, variant);

    let Some(quantity) = parse_quantity(form.quantity.as_deref()) else {
        let notice = Flash::error("Số lượng không hợp lệ");
        return Ok(notice_response(htmx, &session, notice, &back, false).await);
    };

    let product = state.api().get_product(&form.product_slug).await?;
    let outcome =
        add_product_to_cart(&state, &session, &customer, &product, variant, quantity).await?;

    Ok(match outcome {
        AddOutcome::Added { coupon, .. } => {
            let message = match coupon.notice {
                Some(notice) => format!("Đã thêm vào giỏ hàng. {notice}"),
                None => "Đã thêm vào giỏ hàng".to_string(),
            };
            notice_response(htmx, &session, Flash::success(message), &back, true).await
        }
        AddOutcome::Blocked { message } => {
            notice_response(htmx, &session, Flash::error(message), &back, false).await
        }
    })
}

/// Add to cart and go straight to checkout.
#[instrument(skip(state, session, customer))]
pub async fn buy_now(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(slug): Path<String>,
    Form(form): Form<BuyNowForm>,
) -> Result<Response, AppError> {
    let variant = parse_variant(form.variant_id.as_deref());
    let back = product_href(&slug, variant);

    let Some(quantity) = parse_quantity(form.quantity.as_deref()) else {
        Flash::error("Số lượng không hợp lệ").set(&session).await;
        return Ok(Redirect::to(&back).into_response());
    };

    let product = state.api().get_product(&slug).await?;
    match add_product_to_cart(&state, &session, &customer, &product, variant, quantity).await? {
        AddOutcome::Added { coupon, .. } => {
            if let Some(notice) = coupon.notice {
                Flash::info(notice).set(&session).await;
            }
            Ok(Redirect::to("/checkout").into_response())
        }
        AddOutcome::Blocked { message } => {
            Flash::error(message).set(&session).await;
            Ok(Redirect::to(&back).into_response())
        }
    }
}

/// Update cart item quantity. A quantity of 0 removes the line.
#[instrument(skip(state, session, customer, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response, AppError> {
    let htmx = is_htmx_request(&headers);
    let item_id = form
        .item_id
        .parse::<CartItemId>()
        .map_err(|_| AppError::BadRequest("Sản phẩm không hợp lệ".to_string()))?;

    let current = state.api().get_cart(&customer.token).await?;
    let Some(line) = current.items.iter().find(|i| i.id == item_id) else {
        let coupon = refresh_coupon(state.api(), &session, &customer.token, subtotal(&current), false).await?;
        let notice = Flash::info("Sản phẩm không còn trong giỏ hàng");
        return Ok(cart_panel_response(htmx, &session, &current, coupon, Some(notice)).await);
    };

    let Some(requested) = form.quantity.trim().parse::<u32>().ok() else {
        let coupon = refresh_coupon(state.api(), &session, &customer.token, subtotal(&current), false).await?;
        let notice = Flash::error("Số lượng không hợp lệ");
        return Ok(cart_panel_response(htmx, &session, &current, coupon, Some(notice)).await);
    };

    let (quantity, mut notice) = match line.stock {
        Some(stock) if requested > stock => (
            stock,
            Some(Flash::info(format!("Chỉ còn {stock} sản phẩm trong kho"))),
        ),
        _ => (requested, None),
    };

    let result = if quantity == 0 {
        state.api().remove_cart_item(&customer.token, item_id).await
    } else {
        state
            .api()
            .update_cart_item(&customer.token, item_id, quantity)
            .await
    };

    let cart = match result {
        Ok(cart) => cart,
        Err(ApiError::Rejected(message)) => {
            notice = Some(Flash::error(non_empty_or(
                message,
                "Không thể cập nhật số lượng",
            )));
            current
        }
        Err(e) => return Err(e.into()),
    };

    let coupon = refresh_coupon(state.api(), &session, &customer.token, subtotal(&cart), true).await?;
    Ok(cart_panel_response(htmx, &session, &cart, coupon, notice).await)
}

/// Remove item from cart.
#[instrument(skip(state, session, customer, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response, AppError> {
    let htmx = is_htmx_request(&headers);
    let item_id = form
        .item_id
        .parse::<CartItemId>()
        .map_err(|_| AppError::BadRequest("Sản phẩm không hợp lệ".to_string()))?;

    let cart = state
        .api()
        .remove_cart_item(&customer.token, item_id)
        .await?;

    let coupon = refresh_coupon(state.api(), &session, &customer.token, subtotal(&cart), true).await?;
    Ok(cart_panel_response(htmx, &session, &cart, coupon, None).await)
}

/// Apply a coupon code to the cart.
#[instrument(skip(state, session, customer, headers, form))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<CouponForm>,
) -> Result<Response, AppError> {
    let htmx = is_htmx_request(&headers);
    let cart = state.api().get_cart(&customer.token).await?;

    let (coupon, notice) =
        apply_to_session(state.api(), &session, &customer.token, &form.code, subtotal(&cart)).await?;
    Ok(cart_panel_response(htmx, &session, &cart, coupon, Some(notice)).await)
}

/// Try `code` against `subtotal` and record an accepted coupon in the session.
///
/// A failed attempt leaves any previously applied coupon in place.
pub(crate) async fn apply_to_session<A: CouponApi>(
    api: &A,
    session: &Session,
    token: &AccessToken,
    code: &str,
    subtotal: Price,
) -> Result<(CouponState, Flash), AppError> {
    let (coupon, notice) = match coupon::apply(api, token, code, subtotal).await {
        Ok(applied) => {
            store_coupon(session, &applied).await?;
            tracing::info!(code = %applied.code, discount = %applied.discount, "Coupon applied");
            let notice = Flash::success(format!("Đã áp dụng mã {}", applied.code));
            (Some(applied), notice)
        }
        Err(CouponError::Api(e)) => return Err(e.into()),
        Err(e) => (applied_coupon(session).await, Flash::error(e.to_string())),
    };
    Ok((CouponState { coupon, notice: None }, notice))
}

/// Remove the applied coupon.
#[instrument(skip(state, session, customer, headers))]
pub async fn remove_coupon(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let htmx = is_htmx_request(&headers);
    clear_coupon(&session).await?;
    let cart = state.api().get_cart(&customer.token).await?;
    let notice = Flash {
        kind: FlashKind::Info,
        message: "Đã gỡ mã giảm giá".to_string(),
    };
    Ok(cart_panel_response(htmx, &session, &cart, CouponState::default(), Some(notice)).await)
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, customer))]
pub async fn count(
    State(state): State<AppState>,
    OptionalAuth(customer): OptionalAuth,
) -> CartCountTemplate {
    let count = match customer {
        Some(customer) => match state.api().get_cart(&customer.token).await {
            Ok(cart) => CartTotals::compute(&cart.items, None).item_count,
            Err(e) => {
                tracing::debug!(error = %e, "Cart count unavailable");
                0
            }
        },
        None => 0,
    };

    CartCountTemplate { count }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    use tower_sessions::MemoryStore;

    use super::*;
    use crate::api::CouponValidation;
    use shuttle_house_core::cart::CouponCode;

    /// Backend that answers every coupon check the same way.
    struct FakeCoupons {
        answer: fn() -> Result<CouponValidation, ApiError>,
        calls: Mutex<Vec<Price>>,
    }

    impl FakeCoupons {
        fn new(answer: fn() -> Result<CouponValidation, ApiError>) -> Self {
            Self {
                answer,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Price> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CouponApi for FakeCoupons {
        fn validate_coupon(
            &self,
            _token: &AccessToken,
            _code: &str,
            order_amount: Price,
        ) -> impl Future<Output = Result<CouponValidation, ApiError>> + Send {
            self.calls.lock().unwrap().push(order_amount);
            let answer = (self.answer)();
            async move { answer }
        }
    }

    fn still_valid() -> Result<CouponValidation, ApiError> {
        Ok(CouponValidation {
            valid: true,
            message: None,
            discount_amount: Price::from_dong(30_000),
        })
    }

    fn below_minimum() -> Result<CouponValidation, ApiError> {
        Ok(CouponValidation {
            valid: false,
            message: Some("Đơn hàng chưa đạt giá trị tối thiểu".to_string()),
            discount_amount: Price::ZERO,
        })
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn token() -> AccessToken {
        AccessToken::new("t".to_string())
    }

    fn sale50k() -> AppliedCoupon {
        AppliedCoupon {
            code: CouponCode::parse("SALE50K").unwrap(),
            discount: Price::from_dong(50_000),
            validated_subtotal: Price::from_dong(1_455_000),
        }
    }

    fn cart() -> Cart {
        serde_json::from_str(
            r#"{"items": [
                {"id": 1, "product": {"id": 7, "name": "Vợt Yonex", "slug": "vot-yonex"},
                 "variant": {"id": 2, "size": "4U"}, "price": 1200000, "quantity": 1, "stock": 3},
                {"id": 2, "product": {"id": 9, "name": "Cầu Thành Công", "slug": "cau-thanh-cong"},
                 "price": 85000, "quantity": 3}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_cart_view_totals() {
        let view = CartView::build(&cart(), None);
        assert_eq!(view.subtotal, "1.455.000₫");
        assert_eq!(view.total, "1.455.000₫");
        assert_eq!(view.item_count, 4);
        assert!(view.discount.is_none());
        assert_eq!(view.items[0].max_quantity, 3);
        assert_eq!(view.items[1].max_quantity, DEFAULT_MAX_QUANTITY);
    }

    #[test]
    fn test_cart_view_applies_coupon_discount() {
        let coupon = AppliedCoupon {
            code: CouponCode::parse("SALE50K").unwrap(),
            discount: Price::from_dong(50_000),
            validated_subtotal: Price::from_dong(1_455_000),
        };
        let view = CartView::build(&cart(), Some(&coupon));
        assert_eq!(view.discount.as_deref(), Some("50.000₫"));
        assert_eq!(view.total, "1.405.000₫");
        assert_eq!(view.coupon_code.as_deref(), Some("SALE50K"));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(None), Some(1));
        assert_eq!(parse_quantity(Some(" ")), Some(1));
        assert_eq!(parse_quantity(Some("3")), Some(3));
        assert_eq!(parse_quantity(Some("-1")), None);
    }

    #[test]
    fn test_product_href() {
        assert_eq!(product_href("vot-yonex", None), "/products/vot-yonex");
        assert_eq!(
            product_href("vot-yonex", Some(VariantId::new(4))),
            "/products/vot-yonex?variant=4"
        );
    }

    #[tokio::test]
    async fn test_refresh_without_coupon_skips_backend() {
        let api = FakeCoupons::new(still_valid);
        let state = refresh_coupon(&api, &session(), &token(), Price::from_dong(1_455_000), true)
            .await
            .unwrap();
        assert!(state.coupon.is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_unforced_trusts_unchanged_subtotal() {
        let api = FakeCoupons::new(below_minimum);
        let session = session();
        store_coupon(&session, &sale50k()).await.unwrap();

        let state = refresh_coupon(&api, &session, &token(), Price::from_dong(1_455_000), false)
            .await
            .unwrap();
        assert_eq!(state.coupon, Some(sale50k()));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_forced_refresh_drops_invalid_coupon() {
        let api = FakeCoupons::new(below_minimum);
        let session = session();
        store_coupon(&session, &sale50k()).await.unwrap();

        let state = refresh_coupon(&api, &session, &token(), Price::from_dong(1_455_000), true)
            .await
            .unwrap();
        assert!(state.coupon.is_none());
        assert!(state.notice.is_some());
        assert_eq!(api.calls(), vec![Price::from_dong(1_455_000)]);
        assert!(applied_coupon(&session).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_on_empty_cart_drops_coupon_without_call() {
        let api = FakeCoupons::new(still_valid);
        let session = session();
        store_coupon(&session, &sale50k()).await.unwrap();

        let state = refresh_coupon(&api, &session, &token(), Price::ZERO, true)
            .await
            .unwrap();
        assert!(state.coupon.is_none());
        assert!(state.notice.is_some());
        assert!(api.calls().is_empty());
        assert!(applied_coupon(&session).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_after_quantity_change_updates_discount() {
        let api = FakeCoupons::new(still_valid);
        let session = session();
        store_coupon(&session, &sale50k()).await.unwrap();

        let state = refresh_coupon(&api, &session, &token(), Price::from_dong(1_370_000), false)
            .await
            .unwrap();
        let kept = state.coupon.unwrap();
        assert_eq!(kept.discount, Price::from_dong(30_000));
        assert_eq!(kept.validated_subtotal, Price::from_dong(1_370_000));
        assert_eq!(applied_coupon(&session).await, Some(kept));
    }

    #[tokio::test]
    async fn test_failed_apply_keeps_previous_coupon_and_total() {
        let api = FakeCoupons::new(below_minimum);
        let session = session();
        store_coupon(&session, &sale50k()).await.unwrap();
        let before = CartView::build(&cart(), Some(&sale50k())).total;

        let (state, notice) =
            apply_to_session(&api, &session, &token(), "FREESHIP", Price::from_dong(1_455_000))
                .await
                .unwrap();

        assert_eq!(notice.kind, FlashKind::Error);
        assert_eq!(notice.message, "Đơn hàng chưa đạt giá trị tối thiểu");
        assert_eq!(state.coupon, Some(sale50k()));
        assert_eq!(CartView::build(&cart(), state.coupon.as_ref()).total, before);
        assert_eq!(applied_coupon(&session).await, Some(sale50k()));
    }

    #[tokio::test]
    async fn test_failed_apply_without_coupon_leaves_full_total() {
        let api = FakeCoupons::new(below_minimum);
        let session = session();

        let (state, _) =
            apply_to_session(&api, &session, &token(), "FREESHIP", Price::from_dong(1_455_000))
                .await
                .unwrap();

        assert!(state.coupon.is_none());
        assert_eq!(CartView::build(&cart(), None).total, "1.455.000₫");
        assert!(applied_coupon(&session).await.is_none());
    }

    #[tokio::test]
    async fn test_successful_apply_stores_coupon() {
        let api = FakeCoupons::new(still_valid);
        let session = session();

        let (state, notice) =
            apply_to_session(&api, &session, &token(), "sale30k", Price::from_dong(1_455_000))
                .await
                .unwrap();

        assert_eq!(notice.kind, FlashKind::Success);
        let coupon = state.coupon.unwrap();
        assert_eq!(coupon.discount, Price::from_dong(30_000));
        assert_eq!(applied_coupon(&session).await, Some(coupon));
    }
}

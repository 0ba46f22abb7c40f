//! Order history, order detail and public order tracking.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shuttle_house_core::cart::PricedLine;
use shuttle_house_core::checkout::{PaymentMethod, normalize_phone};
use shuttle_house_core::{OrderId, OrderStatus};

use crate::api::{ApiError, Order, OrderItem};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::Flash;
use crate::routes::PageContext;
use crate::services::checkout::{CheckoutError, retry_payment};
use crate::state::AppState;

/// Steps shown on the tracking timeline, in order.
const TIMELINE: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Processing,
    OrderStatus::Shipping,
    OrderStatus::Delivered,
];

// =============================================================================
// Views
// =============================================================================

/// Order line display data.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    /// Link target for the product, also used for the review anchor.
    pub href: Option<String>,
    pub size: Option<String>,
    pub image: Option<String>,
    pub price: String,
    pub quantity: u32,
    pub line_total: String,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            name: item.product_name.clone(),
            href: item
                .product_slug
                .as_deref()
                .map(|slug| format!("/products/{}", urlencoding::encode(slug))),
            size: item.size.clone(),
            image: item.image.clone(),
            price: item.price.display(),
            quantity: item.quantity,
            line_total: item.line_total().display(),
        }
    }
}

/// One step on the status timeline.
#[derive(Clone)]
pub struct TimelineStep {
    pub label: &'static str,
    pub done: bool,
    pub current: bool,
}

/// Order display data.
#[derive(Clone)]
pub struct OrderView {
    pub id: i64,
    pub code: String,
    pub href: String,
    pub status_label: &'static str,
    /// CSS modifier, e.g. `status--pending`.
    pub status_class: String,
    pub payment_label: &'static str,
    pub payment_method_label: &'static str,
    pub is_bank_transfer: bool,
    pub items: Vec<OrderItemView>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub shipping_fee: Option<String>,
    pub total: String,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub note: Option<String>,
    pub coupon_code: Option<String>,
    pub created_at: String,
    /// Empty for cancelled and returned orders.
    pub timeline: Vec<TimelineStep>,
    pub can_cancel: bool,
    pub can_pay: bool,
    pub can_review: bool,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let timeline = order
            .status
            .timeline_step()
            .map(|reached| {
                TIMELINE
                    .iter()
                    .enumerate()
                    .map(|(i, status)| TimelineStep {
                        label: status.label(),
                        done: i <= reached,
                        current: i == reached,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let status_key = serde_json::to_value(order.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        Self {
            id: order.id.as_i64(),
            code: order.code.clone(),
            href: format!("/account/orders/{}", order.id),
            status_label: order.status.label(),
            status_class: format!("status--{status_key}"),
            payment_label: order.payment_status.label(),
            payment_method_label: order.payment_method.label(),
            is_bank_transfer: order.payment_method == PaymentMethod::BankTransfer,
            items: order.items.iter().map(OrderItemView::from).collect(),
            subtotal: order.subtotal.display(),
            discount: (!order.discount.is_zero()).then(|| order.discount.display()),
            shipping_fee: (!order.shipping_fee.is_zero()).then(|| order.shipping_fee.display()),
            total: order.total.display(),
            full_name: order.shipping.full_name.clone(),
            phone: order.shipping.phone.clone(),
            address: order.shipping.address.clone(),
            note: order.shipping.note.clone(),
            coupon_code: order.coupon_code.clone(),
            created_at: order.created_at.format("%d/%m/%Y %H:%M").to_string(),
            timeline,
            can_cancel: order.status.is_cancellable(),
            can_pay: order.awaits_online_payment(),
            can_review: order.status.allows_review(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrderListTemplate {
    pub ctx: PageContext,
    pub orders: Vec<OrderView>,
    pub error: Option<String>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub ctx: PageContext,
    pub order: OrderView,
}

/// Public order tracking page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/track.html")]
pub struct OrderTrackTemplate {
    pub ctx: PageContext,
    pub code: String,
    pub phone: String,
    pub order: Option<OrderView>,
    pub error: Option<String>,
}

/// Parse an order ID path segment; anything else is a 404.
pub(crate) fn parse_order_id(raw: &str) -> Result<OrderId, AppError> {
    raw.parse::<OrderId>()
        .map_err(|_| AppError::NotFound(format!("order {raw}")))
}

// =============================================================================
// Handlers
// =============================================================================

/// Tracking query: `?code=SH000042&phone=0912345678`.
#[derive(Debug, Default, Deserialize)]
pub struct TrackQuery {
    pub code: Option<String>,
    pub phone: Option<String>,
}

/// Look up an order by code and phone (no login required).
///
/// The phone is masked on the result page.
#[instrument(skip(state, ctx, query))]
pub async fn track(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<TrackQuery>,
) -> Result<OrderTrackTemplate, AppError> {
    let code = query.code.unwrap_or_default().trim().to_uppercase();
    let phone_input = query.phone.unwrap_or_default().trim().to_string();

    let mut page = OrderTrackTemplate {
        ctx,
        code: code.clone(),
        phone: phone_input.clone(),
        order: None,
        error: None,
    };

    if code.is_empty() && phone_input.is_empty() {
        return Ok(page);
    }
    if code.is_empty() {
        page.error = Some("Vui lòng nhập mã đơn hàng".to_string());
        return Ok(page);
    }
    let Some(phone) = normalize_phone(&phone_input) else {
        page.error = Some("Số điện thoại phải gồm 10 chữ số và bắt đầu bằng 0".to_string());
        return Ok(page);
    };

    match state.api().track_order(&code, &phone).await {
        Ok(order) => page.order = Some(OrderView::from(&order)),
        Err(ApiError::NotFound(_)) => {
            page.error = Some(
                "Không tìm thấy đơn hàng. Vui lòng kiểm tra lại mã đơn và số điện thoại".to_string(),
            );
        }
        Err(e @ (ApiError::Rejected(_) | ApiError::RateLimited(_))) => {
            page.error = Some(e.customer_message());
        }
        Err(e) => return Err(e.into()),
    }

    Ok(page)
}

/// Display order history.
#[instrument(skip(state, ctx, customer))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<OrderListTemplate, AppError> {
    let (orders, error) = match state.api().my_orders(&customer.token).await {
        Ok(orders) => (orders.iter().map(OrderView::from).collect(), None),
        Err(ApiError::Unauthorized(_)) => return Err(AppError::SessionExpired),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch orders");
            (Vec::new(), Some(e.customer_message()))
        }
    };

    Ok(OrderListTemplate { ctx, orders, error })
}

/// Display a single order.
#[instrument(skip(state, ctx, customer))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
) -> Result<OrderShowTemplate, AppError> {
    let id = parse_order_id(&id)?;
    let order = state.api().get_order(&customer.token, id).await?;

    Ok(OrderShowTemplate {
        ctx,
        order: OrderView::from(&order),
    })
}

/// Cancel a pending order.
#[instrument(skip(state, session, customer))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_order_id(&id)?;
    let back = format!("/account/orders/{id}");

    // Checked here too so a stale page gets a clear message instead of a backend error
    let order = state.api().get_order(&customer.token, id).await?;
    if !order.status.is_cancellable() {
        Flash::error("Chỉ có thể hủy đơn hàng đang chờ xác nhận")
            .set(&session)
            .await;
        return Ok(Redirect::to(&back).into_response());
    }

    match state.api().cancel_order(&customer.token, id).await {
        Ok(()) => {
            let order_id = id.to_string();
            add_breadcrumb("order", "Order cancelled", Some(&[("order_id", &order_id)]));
            tracing::info!(order_id = %id, "Order cancelled by customer");
            Flash::success(format!("Đã hủy đơn hàng {}", order.code))
                .set(&session)
                .await;
        }
        Err(ApiError::Rejected(message)) => {
            let message = if message.is_empty() {
                "Không thể hủy đơn hàng này".to_string()
            } else {
                message
            };
            Flash::error(message).set(&session).await;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to(&back).into_response())
}

/// Start a new gateway payment for an unpaid online order.
#[instrument(skip(state, session, customer))]
pub async fn pay(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_order_id(&id)?;
    let back = format!("/account/orders/{id}");

    let order = state.api().get_order(&customer.token, id).await?;
    match retry_payment(
        state.api(),
        &customer.token,
        &order,
        &state.config().base_url,
    )
    .await
    {
        Ok(url) => Ok(Redirect::to(&url).into_response()),
        Err(CheckoutError::Api(e @ ApiError::Unauthorized(_))) => Err(e.into()),
        Err(CheckoutError::Api(e)) => {
            tracing::warn!(order_id = %id, error = %e, "Payment retry failed");
            Flash::error(format!(
                "Không thể khởi tạo thanh toán: {}",
                e.customer_message()
            ))
            .set(&session)
            .await;
            Ok(Redirect::to(&back).into_response())
        }
        Err(e) => {
            Flash::error(e.to_string()).set(&session).await;
            Ok(Redirect::to(&back).into_response())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(status: &str, method: &str, payment_status: &str) -> Order {
        serde_json::from_str(&format!(
            r#"{{
                "id": 42,
                "code": "SH000042",
                "status": "{status}",
                "paymentStatus": "{payment_status}",
                "paymentMethod": "{method}",
                "items": [
                    {{"productId": 7, "productName": "Yonex Astrox 88D", "productSlug": "yonex-astrox-88d",
                      "size": "4U", "price": "3500000", "quantity": 1}}
                ],
                "subtotal": "3500000",
                "discount": "100000",
                "total": "3400000",
                "fullName": "Nguyễn Văn A",
                "phone": "0912345678",
                "address": "12 Lê Lợi, Quận 1",
                "createdAt": "2026-03-01T08:30:00Z"
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_pending_order_view() {
        let view = OrderView::from(&order("pending", "cod", "unpaid"));
        assert_eq!(view.status_class, "status--pending");
        assert!(view.can_cancel);
        assert!(!view.can_pay);
        assert!(!view.can_review);
        assert_eq!(view.discount.as_deref(), Some("100.000₫"));
        assert!(view.shipping_fee.is_none());
        assert_eq!(view.timeline.len(), 5);
        assert!(view.timeline[0].current);
        assert!(!view.timeline[1].done);
        assert_eq!(view.items[0].href.as_deref(), Some("/products/yonex-astrox-88d"));
    }

    #[test]
    fn test_delivered_order_allows_review() {
        let view = OrderView::from(&order("delivered", "cod", "paid"));
        assert!(view.can_review);
        assert!(!view.can_cancel);
        assert!(view.timeline.iter().all(|s| s.done));
    }

    #[test]
    fn test_unpaid_gateway_order_can_pay() {
        let view = OrderView::from(&order("pending", "e_wallet", "unpaid"));
        assert!(view.can_pay);
        let paid = OrderView::from(&order("confirmed", "card_gateway", "paid"));
        assert!(!paid.can_pay);
    }

    #[test]
    fn test_cancelled_order_has_no_timeline() {
        let view = OrderView::from(&order("cancelled", "e_wallet", "unpaid"));
        assert!(view.timeline.is_empty());
        assert!(!view.can_pay);
    }

    #[test]
    fn test_parse_order_id() {
        assert_eq!(parse_order_id("42").unwrap(), OrderId::new(42));
        assert!(matches!(parse_order_id("abc"), Err(AppError::NotFound(_))));
    }
}

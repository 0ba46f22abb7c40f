//! Checkout route handlers.
//!
//! The form posts normally (no HTMX) because the gateway branch ends in a
//! cross-origin redirect.

use std::collections::HashMap;

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

use shuttle_house_core::checkout::{PaymentMethod, ShippingDetails};

use crate::api::{ApiError, Cart, User};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::session::clear_coupon;
use crate::models::Flash;
use crate::routes::PageContext;
use crate::routes::cart::{CartView, CouponState, refresh_coupon, subtotal};
use crate::routes::orders::{OrderView, parse_order_id};
use crate::services::checkout::{
    CheckoutError, CheckoutOutcome, CheckoutRequest, PaymentReturn, place_order,
};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Values echoed back into the checkout form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub payment_method: String,
}

impl CheckoutForm {
    /// Prefill from the customer's profile.
    fn from_profile(user: &User) -> Self {
        Self {
            full_name: user.name.clone(),
            phone: user.phone.clone().unwrap_or_default(),
            address: user.address.clone().unwrap_or_default(),
            note: String::new(),
            payment_method: PaymentMethod::default().as_str().to_string(),
        }
    }
}

/// A payment method radio button.
pub struct MethodOption {
    pub value: &'static str,
    pub label: &'static str,
    pub checked: bool,
}

fn method_options(selected: &str) -> Vec<MethodOption> {
    let selected = selected
        .parse::<PaymentMethod>()
        .unwrap_or_default();
    PaymentMethod::ALL
        .iter()
        .map(|m| MethodOption {
            value: m.as_str(),
            label: m.label(),
            checked: *m == selected,
        })
        .collect()
}

// =============================================================================
// Templates
// =============================================================================

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
    pub form: CheckoutForm,
    pub methods: Vec<MethodOption>,
    pub notice: Option<Flash>,
}

/// Order confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct SuccessTemplate {
    pub ctx: PageContext,
    pub order: OrderView,
    /// Google Maps embed URL for the delivery address.
    pub map_url: String,
}

/// Bank transfer instructions template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/bank_transfer.html")]
pub struct BankTransferTemplate {
    pub ctx: PageContext,
    pub order: OrderView,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    /// Amount in plain digits for copying into a banking app.
    pub amount_digits: String,
    pub reference: String,
}

/// Gateway return page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/payment_return.html")]
pub struct PaymentReturnTemplate {
    pub ctx: PageContext,
    /// `paid`, `failed` or `unknown`; used as a CSS modifier.
    pub verdict: &'static str,
    pub title: &'static str,
    pub message: &'static str,
    pub order: Option<OrderView>,
}

/// Embed URL for a map centred on `address`.
fn map_embed_url(address: &str) -> String {
    format!(
        "https://www.google.com/maps?q={}&output=embed",
        urlencoding::encode(address)
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Render the checkout form for the current cart.
///
/// Falls back to the cart page when the cart is empty.
fn render_form(
    ctx: PageContext,
    form: CheckoutForm,
    cart: &Cart,
    coupon: CouponState,
    notice: Option<Flash>,
) -> Response {
    if cart.items.is_empty() {
        return empty_cart_redirect().into_response();
    }

    let notice = coupon.notice.map(Flash::info).or(notice);
    CheckoutTemplate {
        methods: method_options(&form.payment_method),
        cart: CartView::build(cart, coupon.coupon.as_ref()),
        form,
        notice,
        ctx,
    }
    .into_response()
}

fn empty_cart_redirect() -> Redirect {
    Redirect::to("/cart")
}

/// Display the checkout form, prefilled from the profile.
#[instrument(skip(state, session, ctx, customer))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    mut ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<Response, AppError> {
    let api = state.api();
    let (cart, profile) = tokio::join!(api.get_cart(&customer.token), api.profile(&customer.token));
    let cart = cart?;

    let form = match profile {
        Ok(user) => CheckoutForm::from_profile(&user),
        Err(ApiError::Unauthorized(_)) => return Err(AppError::SessionExpired),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to prefill checkout from profile");
            CheckoutForm {
                full_name: customer.name.clone(),
                payment_method: PaymentMethod::default().as_str().to_string(),
                ..CheckoutForm::default()
            }
        }
    };

    if cart.items.is_empty() {
        Flash::info("Giỏ hàng của bạn đang trống").set(&session).await;
        return Ok(empty_cart_redirect().into_response());
    }

    let coupon = refresh_coupon(state.api(), &session, &customer.token, subtotal(&cart), false).await?;
    let notice = ctx.flash.take();

    Ok(render_form(ctx, form, &cart, coupon, notice))
}

/// Place the order and branch on the payment method.
#[instrument(skip(state, session, ctx, customer, form))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Response, AppError> {
    let cart = state.api().get_cart(&customer.token).await?;
    if cart.items.is_empty() {
        Flash::info("Giỏ hàng của bạn đang trống").set(&session).await;
        return Ok(empty_cart_redirect().into_response());
    }

    // Re-check the coupon against the cart that is about to be ordered
    let coupon = refresh_coupon(state.api(), &session, &customer.token, subtotal(&cart), true).await?;

    if coupon.notice.is_some() {
        // Totals changed under the customer; show them before taking the order
        return Ok(render_form(ctx, form, &cart, coupon, None));
    }

    let shipping = match ShippingDetails::validate(
        &form.full_name,
        &form.phone,
        &form.address,
        Some(form.note.as_str()),
    ) {
        Ok(shipping) => shipping,
        Err(e) => {
            let notice = Flash::error(e.to_string());
            return Ok(render_form(ctx, form, &cart, coupon, Some(notice)));
        }
    };

    let Ok(payment_method) = form.payment_method.parse::<PaymentMethod>() else {
        let notice = Flash::error("Vui lòng chọn phương thức thanh toán");
        return Ok(render_form(ctx, form, &cart, coupon, Some(notice)));
    };

    let request = CheckoutRequest {
        shipping,
        payment_method,
        coupon: coupon.coupon.as_ref().map(|c| c.code.clone()),
    };

    let outcome = match place_order(
        state.api(),
        &customer.token,
        request,
        &state.config().base_url,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(CheckoutError::Api(e)) => return Err(e.into()),
        Err(e) => {
            let notice = Flash::error(e.to_string());
            return Ok(render_form(ctx, form, &cart, coupon, Some(notice)));
        }
    };

    // The coupon is spent once the order exists, whatever happens next
    clear_coupon(&session).await?;

    let order = outcome.order();
    let order_id = order.id.to_string();
    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_id", &order_id), ("method", payment_method.as_str())]),
    );

    Ok(match outcome {
        CheckoutOutcome::Completed(order) => {
            Redirect::to(&format!("/checkout/success/{}", order.id)).into_response()
        }
        CheckoutOutcome::AwaitingTransfer(order) => {
            Redirect::to(&format!("/checkout/bank-transfer/{}", order.id)).into_response()
        }
        CheckoutOutcome::Redirect { url, .. } => Redirect::to(&url).into_response(),
        CheckoutOutcome::PaymentPending { order, reason } => {
            Flash::error(format!(
                "Đơn hàng {} đã được tạo nhưng chưa thể khởi tạo thanh toán ({reason}). \
                 Bạn có thể thanh toán lại tại đây.",
                order.code
            ))
            .set(&session)
            .await;
            Redirect::to(&format!("/account/orders/{}", order.id)).into_response()
        }
    })
}

/// Order confirmation page.
#[instrument(skip(state, ctx, customer))]
pub async fn success(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
) -> Result<SuccessTemplate, AppError> {
    let id = parse_order_id(&id)?;
    let order = state.api().get_order(&customer.token, id).await?;

    Ok(SuccessTemplate {
        ctx,
        map_url: map_embed_url(&order.shipping.address),
        order: OrderView::from(&order),
    })
}

/// Bank transfer instructions for an order.
#[instrument(skip(state, ctx, customer))]
pub async fn bank_transfer(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_order_id(&id)?;
    let order = state.api().get_order(&customer.token, id).await?;

    if order.payment_method != PaymentMethod::BankTransfer {
        return Ok(Redirect::to(&format!("/checkout/success/{id}")).into_response());
    }

    let bank = &state.config().bank;
    Ok(BankTransferTemplate {
        ctx,
        bank_name: bank.bank_name.clone(),
        account_number: bank.account_number.clone(),
        account_holder: bank.account_holder.clone(),
        amount_digits: order.total.to_dong().to_string(),
        reference: order.code.clone(),
        order: OrderView::from(&order),
    }
    .into_response())
}

/// Page the payment gateway sends the customer back to.
///
/// Shows the gateway's verdict; the order itself is loaded when the customer
/// is still logged in so its backend payment status can be shown alongside.
#[instrument(skip(state, ctx, customer, params))]
pub async fn payment_return(
    State(state): State<AppState>,
    ctx: PageContext,
    OptionalAuth(customer): OptionalAuth,
    Query(params): Query<HashMap<String, String>>,
) -> PaymentReturnTemplate {
    let verdict = PaymentReturn::from_query(&params);
    tracing::info!(?verdict, order_id = ?PaymentReturn::order_id(&params), "Payment return");

    let order = match (customer, PaymentReturn::order_id(&params)) {
        (Some(customer), Some(id)) => match state.api().get_order(&customer.token, id).await {
            Ok(order) => Some(OrderView::from(&order)),
            Err(e) => {
                tracing::warn!(order_id = %id, error = %e, "Failed to load order after payment");
                None
            }
        },
        _ => None,
    };

    let (verdict, title, message) = match verdict {
        PaymentReturn::Paid => (
            "paid",
            "Thanh toán thành công",
            "Cảm ơn bạn! Đơn hàng của bạn đã được thanh toán.",
        ),
        PaymentReturn::Failed => (
            "failed",
            "Thanh toán không thành công",
            "Giao dịch chưa hoàn tất. Bạn có thể thanh toán lại từ trang đơn hàng.",
        ),
        PaymentReturn::Unknown => (
            "unknown",
            "Đang xử lý thanh toán",
            "Chúng tôi chưa nhận được kết quả thanh toán. Vui lòng kiểm tra lại trạng thái đơn hàng.",
        ),
    };

    PaymentReturnTemplate {
        ctx,
        verdict,
        title,
        message,
        order,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_method_options_default_to_cod() {
        let options = method_options("");
        assert_eq!(options.len(), 4);
        assert!(options[0].checked);
        assert_eq!(options[0].value, "cod");

        let options = method_options("e_wallet");
        assert!(options.iter().any(|o| o.value == "e_wallet" && o.checked));
        assert_eq!(options.iter().filter(|o| o.checked).count(), 1);
    }

    #[test]
    fn test_map_embed_url_encodes_address() {
        assert_eq!(
            map_embed_url("12 Lê Lợi"),
            "https://www.google.com/maps?q=12%20L%C3%AA%20L%E1%BB%A3i&output=embed"
        );
    }

    #[test]
    fn test_form_prefill_from_profile() {
        let user: User = serde_json::from_str(
            r#"{"id": 3, "name": "Lan", "email": "lan@example.vn", "phone": "0912345678"}"#,
        )
        .unwrap();
        let form = CheckoutForm::from_profile(&user);
        assert_eq!(form.full_name, "Lan");
        assert_eq!(form.phone, "0912345678");
        assert!(form.address.is_empty());
        assert_eq!(form.payment_method, "cod");
    }
}

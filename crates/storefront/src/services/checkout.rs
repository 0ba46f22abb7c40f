//! Order placement and payment-method branching.
//!
//! The order record is always created first. What happens next depends on
//! the payment method:
//!
//! | method | after the order exists |
//! |--------|------------------------|
//! | COD | clear cart, show success |
//! | bank transfer | clear cart, show bank instructions |
//! | e-wallet / card | create a gateway payment, clear cart once a URL came back, redirect |
//!
//! A gateway failure leaves both the order and the cart alone so the
//! customer can retry payment from the order page.

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use shuttle_house_core::OrderId;
use shuttle_house_core::cart::CouponCode;
use shuttle_house_core::checkout::{Gateway, PaymentMethod, PostOrderFlow, ShippingDetails};

use crate::api::{AccessToken, ApiClient, ApiError, CreateOrder, CreatePayment, Order, PaymentLink};

/// Backend calls checkout needs.
pub trait CheckoutApi {
    fn create_order(
        &self,
        token: &AccessToken,
        order: &CreateOrder,
    ) -> impl Future<Output = Result<Order, ApiError>> + Send;

    fn create_payment(
        &self,
        token: &AccessToken,
        gateway: Gateway,
        payment: &CreatePayment,
    ) -> impl Future<Output = Result<PaymentLink, ApiError>> + Send;

    fn clear_cart(&self, token: &AccessToken) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl CheckoutApi for ApiClient {
    fn create_order(
        &self,
        token: &AccessToken,
        order: &CreateOrder,
    ) -> impl Future<Output = Result<Order, ApiError>> + Send {
        Self::create_order(self, token, order)
    }

    fn create_payment(
        &self,
        token: &AccessToken,
        gateway: Gateway,
        payment: &CreatePayment,
    ) -> impl Future<Output = Result<PaymentLink, ApiError>> + Send {
        Self::create_payment(self, token, gateway, payment)
    }

    fn clear_cart(&self, token: &AccessToken) -> impl Future<Output = Result<(), ApiError>> + Send {
        Self::clear_cart(self, token)
    }
}

/// Everything the checkout form collected.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub shipping: ShippingDetails,
    pub payment_method: PaymentMethod,
    pub coupon: Option<CouponCode>,
}

/// Where the customer goes after a successful submission.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// COD order placed.
    Completed(Order),
    /// Bank-transfer order placed; show the transfer instructions.
    AwaitingTransfer(Order),
    /// Gateway payment created; send the customer to `url`.
    Redirect { order: Order, url: String },
    /// Order exists but the gateway call failed; cart left intact.
    PaymentPending { order: Order, reason: String },
}

impl CheckoutOutcome {
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Completed(order)
            | Self::AwaitingTransfer(order)
            | Self::Redirect { order, .. }
            | Self::PaymentPending { order, .. } => order,
        }
    }
}

/// Checkout failures that leave no order behind.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Backend refused to create the order; message is customer-facing.
    #[error("{0}")]
    Rejected(String),

    /// The order cannot be paid online (already paid, cancelled, COD).
    #[error("Đơn hàng này không cần thanh toán trực tuyến")]
    NotPayable,

    /// Gateway answered without a usable payment link.
    #[error("Cổng thanh toán không trả về liên kết hợp lệ, vui lòng thử lại")]
    InvalidPaymentLink,

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for CheckoutError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected(message) if !message.is_empty() => Self::Rejected(message),
            other => Self::Api(other),
        }
    }
}

/// Where the gateway sends the customer back to.
#[must_use]
pub fn payment_return_url(base_url: &str, order_id: OrderId) -> String {
    format!(
        "{}/checkout/payment-return?orderId={order_id}",
        base_url.trim_end_matches('/')
    )
}

/// Create the order and run the post-creation branch for its payment method.
///
/// # Errors
///
/// Returns [`CheckoutError`] only when the order itself could not be
/// created. Failures after that point are reported through the outcome.
#[instrument(skip(api, token, request, base_url), fields(method = request.payment_method.as_str()))]
pub async fn place_order<A: CheckoutApi + Sync>(
    api: &A,
    token: &AccessToken,
    request: CheckoutRequest,
    base_url: &str,
) -> Result<CheckoutOutcome, CheckoutError> {
    let body = CreateOrder {
        shipping: request.shipping,
        payment_method: request.payment_method,
        coupon_code: request.coupon.map(|c| c.as_str().to_string()),
    };
    let order = api.create_order(token, &body).await?;
    info!(order_id = %order.id, code = %order.code, "Order created");

    match request.payment_method.flow() {
        PostOrderFlow::Complete => {
            clear_cart_after_order(api, token, order.id).await;
            Ok(CheckoutOutcome::Completed(order))
        }
        PostOrderFlow::BankInstructions => {
            clear_cart_after_order(api, token, order.id).await;
            Ok(CheckoutOutcome::AwaitingTransfer(order))
        }
        PostOrderFlow::GatewayRedirect(gateway) => {
            let payment = CreatePayment {
                order_id: order.id,
                return_url: payment_return_url(base_url, order.id),
            };
            match api.create_payment(token, gateway, &payment).await {
                Ok(link) => match redirect_target(&link) {
                    Some(url) => {
                        clear_cart_after_order(api, token, order.id).await;
                        Ok(CheckoutOutcome::Redirect { order, url })
                    }
                    None => {
                        warn!(order_id = %order.id, payment_url = %link.payment_url, "Gateway returned an unusable payment URL");
                        Ok(CheckoutOutcome::PaymentPending {
                            order,
                            reason: CheckoutError::InvalidPaymentLink.to_string(),
                        })
                    }
                },
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "Gateway payment creation failed");
                    Ok(CheckoutOutcome::PaymentPending {
                        order,
                        reason: e.customer_message(),
                    })
                }
            }
        }
    }
}

/// Create a fresh gateway payment for an unpaid online order.
///
/// # Errors
///
/// Returns [`CheckoutError::NotPayable`] if the order does not await online
/// payment, or the backend error otherwise.
#[instrument(skip(api, token, order, base_url), fields(order_id = %order.id))]
pub async fn retry_payment<A: CheckoutApi + Sync>(
    api: &A,
    token: &AccessToken,
    order: &Order,
    base_url: &str,
) -> Result<String, CheckoutError> {
    if !order.awaits_online_payment() {
        return Err(CheckoutError::NotPayable);
    }
    let PostOrderFlow::GatewayRedirect(gateway) = order.payment_method.flow() else {
        return Err(CheckoutError::NotPayable);
    };

    let payment = CreatePayment {
        order_id: order.id,
        return_url: payment_return_url(base_url, order.id),
    };
    let link = api.create_payment(token, gateway, &payment).await?;
    redirect_target(&link).ok_or_else(|| {
        warn!(order_id = %order.id, payment_url = %link.payment_url, "Gateway returned an unusable payment URL");
        CheckoutError::InvalidPaymentLink
    })
}

/// The gateway link, if it is an absolute http(s) URL.
fn redirect_target(link: &PaymentLink) -> Option<String> {
    let raw = link.payment_url.trim();
    let url = Url::parse(raw).ok()?;
    let web = matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|host| !host.is_empty());
    web.then(|| raw.to_string())
}

/// Verdict carried on the gateway's return redirect.
///
/// Display-only: the backend settles payments from the gateway callback, so
/// the order page remains the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentReturn {
    Paid,
    Failed,
    Unknown,
}

impl PaymentReturn {
    /// Read the verdict from the return query.
    ///
    /// Understands a plain `status`, `MoMo`'s `resultCode` (`0` is success)
    /// and `VNPay`'s `vnp_ResponseCode` (`00` is success), in that order.
    #[must_use]
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        if let Some(status) = params.get("status") {
            return match status.to_ascii_lowercase().as_str() {
                "success" | "paid" | "ok" => Self::Paid,
                "failed" | "fail" | "cancelled" | "error" => Self::Failed,
                _ => Self::Unknown,
            };
        }
        if let Some(code) = params.get("resultCode") {
            return if code.trim() == "0" { Self::Paid } else { Self::Failed };
        }
        if let Some(code) = params.get("vnp_ResponseCode") {
            return if code.trim() == "00" { Self::Paid } else { Self::Failed };
        }
        Self::Unknown
    }

    /// Order the return belongs to, from our own `orderId` parameter.
    #[must_use]
    pub fn order_id(params: &HashMap<String, String>) -> Option<OrderId> {
        params.get("orderId").and_then(|id| id.parse().ok())
    }
}

/// The order already exists, so a failed clear is logged rather than surfaced.
async fn clear_cart_after_order<A: CheckoutApi + Sync>(api: &A, token: &AccessToken, order_id: OrderId) {
    if let Err(e) = api.clear_cart(token).await {
        warn!(order_id = %order_id, error = %e, "Failed to clear cart after order");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use shuttle_house_core::{OrderStatus, PaymentStatus, Price};

    use super::*;

    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        reject_order: bool,
        gateway_down: bool,
        payment_url: Option<&'static str>,
        status: OrderStatus,
        payment_status: PaymentStatus,
    }

    impl FakeBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn order_for(method: PaymentMethod, status: OrderStatus, payment_status: PaymentStatus) -> Order {
        Order {
            id: OrderId::new(42),
            code: "SH000042".to_string(),
            status,
            payment_status,
            payment_method: method,
            items: Vec::new(),
            subtotal: Price::from_dong(1_000_000),
            discount: Price::ZERO,
            shipping_fee: Price::ZERO,
            total: Price::from_dong(1_000_000),
            shipping: shipping(),
            coupon_code: None,
            created_at: Utc::now(),
        }
    }

    impl CheckoutApi for FakeBackend {
        fn create_order(
            &self,
            _token: &AccessToken,
            order: &CreateOrder,
        ) -> impl Future<Output = Result<Order, ApiError>> + Send {
            self.record(format!("create_order:{}", order.payment_method.as_str()));
            let result = if self.reject_order {
                Err(ApiError::Rejected("Sản phẩm đã hết hàng".to_string()))
            } else {
                Ok(order_for(order.payment_method, self.status, self.payment_status))
            };
            async move { result }
        }

        fn create_payment(
            &self,
            _token: &AccessToken,
            gateway: Gateway,
            payment: &CreatePayment,
        ) -> impl Future<Output = Result<PaymentLink, ApiError>> + Send {
            self.record(format!("create_payment:{}", gateway.provider()));
            let result = if self.gateway_down {
                Err(ApiError::Status {
                    status: 502,
                    message: String::new(),
                })
            } else if let Some(url) = self.payment_url {
                Ok(PaymentLink {
                    payment_url: url.to_string(),
                })
            } else {
                Ok(PaymentLink {
                    payment_url: format!(
                        "https://pay.example/{}/{}",
                        gateway.provider(),
                        payment.order_id
                    ),
                })
            };
            async move { result }
        }

        fn clear_cart(&self, _token: &AccessToken) -> impl Future<Output = Result<(), ApiError>> + Send {
            self.record("clear_cart".to_string());
            async { Ok(()) }
        }
    }

    fn shipping() -> ShippingDetails {
        ShippingDetails::validate("Nguyễn Văn A", "0912345678", "12 Lê Lợi, Q1", None).unwrap()
    }

    fn request(method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest {
            shipping: shipping(),
            payment_method: method,
            coupon: None,
        }
    }

    fn token() -> AccessToken {
        AccessToken::new("t".to_string())
    }

    const BASE: &str = "https://shop.example/";

    #[tokio::test]
    async fn test_cod_completes_without_gateway_call() {
        let api = FakeBackend::default();
        let outcome = place_order(&api, &token(), request(PaymentMethod::Cod), BASE)
            .await
            .unwrap();

        assert!(matches!(outcome, CheckoutOutcome::Completed(_)));
        assert_eq!(api.calls(), vec!["create_order:cod", "clear_cart"]);
    }

    #[tokio::test]
    async fn test_bank_transfer_shows_instructions() {
        let api = FakeBackend::default();
        let outcome = place_order(&api, &token(), request(PaymentMethod::BankTransfer), BASE)
            .await
            .unwrap();

        assert!(matches!(outcome, CheckoutOutcome::AwaitingTransfer(_)));
        assert_eq!(api.calls(), vec!["create_order:bank_transfer", "clear_cart"]);
    }

    #[tokio::test]
    async fn test_gateway_redirects_to_returned_url() {
        let api = FakeBackend::default();
        let outcome = place_order(&api, &token(), request(PaymentMethod::CardGateway), BASE)
            .await
            .unwrap();

        match outcome {
            CheckoutOutcome::Redirect { url, order } => {
                assert_eq!(url, "https://pay.example/vnpay/42");
                assert_eq!(order.id, OrderId::new(42));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            api.calls(),
            vec!["create_order:card_gateway", "create_payment:vnpay", "clear_cart"]
        );
    }

    #[tokio::test]
    async fn test_e_wallet_uses_momo() {
        let api = FakeBackend::default();
        let outcome = place_order(&api, &token(), request(PaymentMethod::EWallet), BASE)
            .await
            .unwrap();
        assert!(matches!(outcome, CheckoutOutcome::Redirect { ref url, .. } if url.contains("/momo/")));
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_order_and_cart() {
        let api = FakeBackend {
            gateway_down: true,
            ..FakeBackend::default()
        };
        let outcome = place_order(&api, &token(), request(PaymentMethod::EWallet), BASE)
            .await
            .unwrap();

        assert!(matches!(outcome, CheckoutOutcome::PaymentPending { .. }));
        assert_eq!(outcome.order().id, OrderId::new(42));
        assert!(!api.calls().contains(&"clear_cart".to_string()));
    }

    #[tokio::test]
    async fn test_empty_payment_url_keeps_cart() {
        let api = FakeBackend {
            payment_url: Some(""),
            ..FakeBackend::default()
        };
        let outcome = place_order(&api, &token(), request(PaymentMethod::EWallet), BASE)
            .await
            .unwrap();

        match outcome {
            CheckoutOutcome::PaymentPending { reason, .. } => {
                assert_eq!(reason, CheckoutError::InvalidPaymentLink.to_string());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(api.calls(), vec!["create_order:e_wallet", "create_payment:momo"]);
    }

    #[tokio::test]
    async fn test_non_http_payment_url_keeps_cart() {
        for bad in ["/relative/pay", "javascript:alert(1)", "not a url", "ftp://pay.example/1"] {
            let api = FakeBackend {
                payment_url: Some(bad),
                ..FakeBackend::default()
            };
            let outcome = place_order(&api, &token(), request(PaymentMethod::CardGateway), BASE)
                .await
                .unwrap();

            assert!(
                matches!(outcome, CheckoutOutcome::PaymentPending { .. }),
                "{bad} should not redirect"
            );
            assert!(!api.calls().contains(&"clear_cart".to_string()));
        }
    }

    #[tokio::test]
    async fn test_retry_payment_rejects_empty_url() {
        let api = FakeBackend {
            payment_url: Some("  "),
            ..FakeBackend::default()
        };
        let unpaid = order_for(PaymentMethod::EWallet, OrderStatus::Pending, PaymentStatus::Unpaid);
        assert!(matches!(
            retry_payment(&api, &token(), &unpaid, BASE).await,
            Err(CheckoutError::InvalidPaymentLink)
        ));
    }

    #[tokio::test]
    async fn test_rejected_order_stops_before_payment() {
        let api = FakeBackend {
            reject_order: true,
            ..FakeBackend::default()
        };
        let err = place_order(&api, &token(), request(PaymentMethod::CardGateway), BASE)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Sản phẩm đã hết hàng");
        assert_eq!(api.calls(), vec!["create_order:card_gateway"]);
    }

    #[tokio::test]
    async fn test_retry_payment_only_for_unpaid_online_orders() {
        let api = FakeBackend::default();
        let unpaid = order_for(PaymentMethod::EWallet, OrderStatus::Pending, PaymentStatus::Unpaid);
        let url = retry_payment(&api, &token(), &unpaid, BASE).await.unwrap();
        assert_eq!(url, "https://pay.example/momo/42");

        let paid = order_for(PaymentMethod::EWallet, OrderStatus::Confirmed, PaymentStatus::Paid);
        assert!(matches!(
            retry_payment(&api, &token(), &paid, BASE).await,
            Err(CheckoutError::NotPayable)
        ));

        let cod = order_for(PaymentMethod::Cod, OrderStatus::Pending, PaymentStatus::Unpaid);
        assert!(matches!(
            retry_payment(&api, &token(), &cod, BASE).await,
            Err(CheckoutError::NotPayable)
        ));
    }

    #[test]
    fn test_payment_return_url() {
        assert_eq!(
            payment_return_url(BASE, OrderId::new(7)),
            "https://shop.example/checkout/payment-return?orderId=7"
        );
    }
    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_payment_return_status_param() {
        assert_eq!(
            PaymentReturn::from_query(&params(&[("status", "success")])),
            PaymentReturn::Paid
        );
        assert_eq!(
            PaymentReturn::from_query(&params(&[("status", "FAILED")])),
            PaymentReturn::Failed
        );
        assert_eq!(PaymentReturn::from_query(&params(&[])), PaymentReturn::Unknown);
    }

    #[test]
    fn test_payment_return_gateway_codes() {
        assert_eq!(
            PaymentReturn::from_query(&params(&[("resultCode", "0")])),
            PaymentReturn::Paid
        );
        assert_eq!(
            PaymentReturn::from_query(&params(&[("resultCode", "1006")])),
            PaymentReturn::Failed
        );
        assert_eq!(
            PaymentReturn::from_query(&params(&[("vnp_ResponseCode", "00")])),
            PaymentReturn::Paid
        );
        assert_eq!(
            PaymentReturn::from_query(&params(&[("vnp_ResponseCode", "24")])),
            PaymentReturn::Failed
        );
    }

    #[test]
    fn test_payment_return_order_id() {
        assert_eq!(
            PaymentReturn::order_id(&params(&[("orderId", "42")])),
            Some(OrderId::new(42))
        );
        assert_eq!(PaymentReturn::order_id(&params(&[("orderId", "x")])), None);
    }
}

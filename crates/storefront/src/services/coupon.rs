//! Coupon application and re-validation.
//!
//! A coupon is validated by the backend against the cart subtotal. The
//! session keeps the code together with the discount the backend reported;
//! every cart mutation asks the backend again, because a quantity change can
//! push the subtotal under the coupon's minimum order amount.

use std::future::Future;

use thiserror::Error;
use tracing::{instrument, warn};

use shuttle_house_core::Price;
use shuttle_house_core::cart::{AppliedCoupon, CouponCode, CouponCodeError};

use crate::api::{AccessToken, ApiClient, ApiError, CouponValidation};

const DEFAULT_INVALID_MESSAGE: &str = "Mã giảm giá không hợp lệ hoặc đã hết hạn";
const EMPTY_CART_MESSAGE: &str = "Giỏ hàng trống nên mã giảm giá đã được gỡ";
const UNAVAILABLE_MESSAGE: &str =
    "Không thể kiểm tra lại mã giảm giá nên mã đã được gỡ, vui lòng áp dụng lại";

/// Backend calls the coupon rules need.
pub trait CouponApi {
    fn validate_coupon(
        &self,
        token: &AccessToken,
        code: &str,
        order_amount: Price,
    ) -> impl Future<Output = Result<CouponValidation, ApiError>> + Send;
}

impl CouponApi for ApiClient {
    fn validate_coupon(
        &self,
        token: &AccessToken,
        code: &str,
        order_amount: Price,
    ) -> impl Future<Output = Result<CouponValidation, ApiError>> + Send {
        Self::validate_coupon(self, token, code, order_amount)
    }
}

/// Why a coupon could not be applied.
#[derive(Debug, Error)]
pub enum CouponError {
    /// Input is not a well-formed code.
    #[error(transparent)]
    Code(#[from] CouponCodeError),

    /// Nothing in the cart to discount.
    #[error("Giỏ hàng đang trống")]
    EmptyCart,

    /// Backend says the code does not apply; message is customer-facing.
    #[error("{0}")]
    Invalid(String),

    /// Backend could not be asked.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result of re-validating an applied coupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    /// Still valid; carries the refreshed discount.
    Kept(AppliedCoupon),
    /// Must be removed from the session; `notice` explains why.
    Dropped { notice: String },
}

/// Validate `input` against the current subtotal.
///
/// # Errors
///
/// Returns [`CouponError::Invalid`] with the backend's message when the
/// coupon does not apply. The cart total is untouched in that case.
#[instrument(skip(api, token))]
pub async fn apply<A: CouponApi>(
    api: &A,
    token: &AccessToken,
    input: &str,
    subtotal: Price,
) -> Result<AppliedCoupon, CouponError> {
    let code = CouponCode::parse(input)?;
    if subtotal.is_zero() {
        return Err(CouponError::EmptyCart);
    }

    let validation = match api.validate_coupon(token, code.as_str(), subtotal).await {
        Ok(validation) => validation,
        Err(ApiError::Rejected(message)) => return Err(CouponError::Invalid(invalid(message))),
        Err(e) => return Err(CouponError::Api(e)),
    };

    if !validation.valid {
        return Err(CouponError::Invalid(invalid(
            validation.message.unwrap_or_default(),
        )));
    }

    Ok(AppliedCoupon {
        code,
        discount: validation.discount_amount.min(subtotal),
        validated_subtotal: subtotal,
    })
}

/// Ask the backend again whether `applied` still holds for `subtotal`.
///
/// An empty cart drops the coupon without a backend call. A backend that
/// cannot be reached also drops it: a stale discount must never reach the
/// checkout page.
///
/// # Errors
///
/// Only [`ApiError::Unauthorized`] is returned, so the caller can end the
/// session. Every other failure becomes [`Revalidation::Dropped`].
#[instrument(skip(api, token, applied), fields(code = %applied.code))]
pub async fn revalidate<A: CouponApi>(
    api: &A,
    token: &AccessToken,
    applied: &AppliedCoupon,
    subtotal: Price,
) -> Result<Revalidation, ApiError> {
    if subtotal.is_zero() {
        return Ok(Revalidation::Dropped {
            notice: EMPTY_CART_MESSAGE.to_string(),
        });
    }

    match api
        .validate_coupon(token, applied.code.as_str(), subtotal)
        .await
    {
        Ok(validation) if validation.valid => Ok(Revalidation::Kept(AppliedCoupon {
            code: applied.code.clone(),
            discount: validation.discount_amount.min(subtotal),
            validated_subtotal: subtotal,
        })),
        Ok(validation) => Ok(Revalidation::Dropped {
            notice: dropped(validation.message.unwrap_or_default()),
        }),
        Err(ApiError::Rejected(message)) => Ok(Revalidation::Dropped {
            notice: dropped(message),
        }),
        Err(ApiError::Unauthorized(message)) => Err(ApiError::Unauthorized(message)),
        Err(e) => {
            warn!(error = %e, "Coupon re-validation failed, dropping coupon");
            Ok(Revalidation::Dropped {
                notice: UNAVAILABLE_MESSAGE.to_string(),
            })
        }
    }
}

fn invalid(message: String) -> String {
    if message.trim().is_empty() {
        DEFAULT_INVALID_MESSAGE.to_string()
    } else {
        message
    }
}

fn dropped(message: String) -> String {
    format!("Mã giảm giá đã được gỡ: {}", invalid(message))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Answers every validation from a canned closure and counts calls.
    struct FakeCoupons<F> {
        answer: F,
        calls: Mutex<Vec<(String, Price)>>,
    }

    impl<F> FakeCoupons<F>
    where
        F: Fn(Price) -> Result<CouponValidation, ApiError> + Sync,
    {
        fn new(answer: F) -> Self {
            Self {
                answer,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl<F> CouponApi for FakeCoupons<F>
    where
        F: Fn(Price) -> Result<CouponValidation, ApiError> + Sync,
    {
        fn validate_coupon(
            &self,
            _token: &AccessToken,
            code: &str,
            order_amount: Price,
        ) -> impl Future<Output = Result<CouponValidation, ApiError>> + Send {
            self.calls
                .lock()
                .unwrap()
                .push((code.to_string(), order_amount));
            let answer = (self.answer)(order_amount);
            async move { answer }
        }
    }

    fn token() -> AccessToken {
        AccessToken::new("test-token".to_string())
    }

    fn valid(discount: i64) -> Result<CouponValidation, ApiError> {
        Ok(CouponValidation {
            valid: true,
            message: None,
            discount_amount: Price::from_dong(discount),
        })
    }

    fn applied(discount: i64, subtotal: i64) -> AppliedCoupon {
        AppliedCoupon {
            code: CouponCode::parse("SALE10").unwrap(),
            discount: Price::from_dong(discount),
            validated_subtotal: Price::from_dong(subtotal),
        }
    }

    #[tokio::test]
    async fn test_apply_uses_server_discount() {
        let api = FakeCoupons::new(|_| valid(50_000));
        let coupon = apply(&api, &token(), " sale10 ", Price::from_dong(500_000))
            .await
            .unwrap();

        assert_eq!(coupon.code.as_str(), "SALE10");
        assert_eq!(coupon.discount, Price::from_dong(50_000));
        assert_eq!(coupon.validated_subtotal, Price::from_dong(500_000));
        assert_eq!(
            api.calls.lock().unwrap()[0],
            ("SALE10".to_string(), Price::from_dong(500_000))
        );
    }

    #[tokio::test]
    async fn test_apply_invalid_returns_server_message() {
        let api = FakeCoupons::new(|_| {
            Ok(CouponValidation {
                valid: false,
                message: Some("Đơn hàng tối thiểu 1.000.000₫".to_string()),
                discount_amount: Price::ZERO,
            })
        });
        let err = apply(&api, &token(), "BIG", Price::from_dong(200_000))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Đơn hàng tối thiểu 1.000.000₫");
    }

    #[tokio::test]
    async fn test_apply_rejected_status_is_invalid() {
        let api = FakeCoupons::new(|_| Err(ApiError::Rejected(String::new())));
        let err = apply(&api, &token(), "OLD", Price::from_dong(200_000))
            .await
            .unwrap_err();
        assert!(matches!(err, CouponError::Invalid(ref m) if m == DEFAULT_INVALID_MESSAGE));
    }

    #[tokio::test]
    async fn test_apply_rejects_bad_input_without_calling_backend() {
        let api = FakeCoupons::new(|_| valid(1));
        assert!(matches!(
            apply(&api, &token(), "   ", Price::from_dong(1_000)).await,
            Err(CouponError::Code(CouponCodeError::Empty))
        ));
        assert!(matches!(
            apply(&api, &token(), "SALE", Price::ZERO).await,
            Err(CouponError::EmptyCart)
        ));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_apply_clamps_discount_to_subtotal() {
        let api = FakeCoupons::new(|_| valid(300_000));
        let coupon = apply(&api, &token(), "FREESHIP", Price::from_dong(120_000))
            .await
            .unwrap();
        assert_eq!(coupon.discount, Price::from_dong(120_000));
    }

    #[tokio::test]
    async fn test_revalidate_refreshes_discount() {
        let api = FakeCoupons::new(|subtotal| valid(subtotal.to_dong() / 10));
        let result = revalidate(&api, &token(), &applied(50_000, 500_000), Price::from_dong(800_000))
            .await
            .unwrap();
        assert_eq!(
            result,
            Revalidation::Kept(applied(80_000, 800_000))
        );
    }

    #[tokio::test]
    async fn test_revalidate_drops_when_no_longer_valid() {
        let api = FakeCoupons::new(|_| {
            Ok(CouponValidation {
                valid: false,
                message: Some("Chưa đạt giá trị tối thiểu".to_string()),
                discount_amount: Price::ZERO,
            })
        });
        let result = revalidate(&api, &token(), &applied(50_000, 500_000), Price::from_dong(100_000))
            .await
            .unwrap();
        match result {
            Revalidation::Dropped { notice } => {
                assert!(notice.contains("Chưa đạt giá trị tối thiểu"));
            }
            Revalidation::Kept(_) => panic!("coupon should be dropped"),
        }
    }

    #[tokio::test]
    async fn test_revalidate_empty_cart_skips_backend() {
        let api = FakeCoupons::new(|_| valid(1));
        let result = revalidate(&api, &token(), &applied(50_000, 500_000), Price::ZERO)
            .await
            .unwrap();
        assert!(matches!(result, Revalidation::Dropped { .. }));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_revalidate_drops_on_backend_failure() {
        let api = FakeCoupons::new(|_| {
            Err(ApiError::Status {
                status: 503,
                message: String::new(),
            })
        });
        let result = revalidate(&api, &token(), &applied(50_000, 500_000), Price::from_dong(400_000))
            .await
            .unwrap();
        assert_eq!(
            result,
            Revalidation::Dropped {
                notice: UNAVAILABLE_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_revalidate_propagates_expired_session() {
        let api = FakeCoupons::new(|_| Err(ApiError::Unauthorized(String::new())));
        let result = revalidate(&api, &token(), &applied(50_000, 500_000), Price::from_dong(400_000)).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}

//! Session-related types.
//!
//! Types stored in the session for authentication state, the applied coupon,
//! and one-shot notices shown on the next rendered page.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use shuttle_house_core::UserId;
use shuttle_house_core::cart::AppliedCoupon;

use crate::api::AccessToken;

/// Session-stored customer identity.
///
/// Holds the backend bearer token; dropping this entry logs the customer out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Backend user ID.
    pub id: UserId,
    pub email: String,
    /// Display name for the header.
    pub name: String,
    /// Backend bearer token.
    pub token: AccessToken,
}

/// Severity of a flash notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Info,
    Error,
}

impl FlashKind {
    /// CSS modifier used by the notice banner.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self {
            Self::Success => "notice--success",
            Self::Info => "notice--info",
            Self::Error => "notice--error",
        }
    }
}

/// A notice shown once on the next page render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// Store the notice for the next page. A failing session store only
    /// loses the notice.
    pub async fn set(self, session: &Session) {
        if let Err(e) = session.insert(keys::FLASH, self).await {
            tracing::warn!(error = %e, "Failed to store flash notice");
        }
    }

    /// Remove and return the pending notice, if any.
    pub async fn take(session: &Session) -> Option<Self> {
        session.remove::<Self>(keys::FLASH).await.ok().flatten()
    }
}

/// Coupon currently applied to the cart.
pub async fn applied_coupon(session: &Session) -> Option<AppliedCoupon> {
    session
        .get::<AppliedCoupon>(keys::APPLIED_COUPON)
        .await
        .ok()
        .flatten()
}

/// Remember an accepted coupon.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn store_coupon(
    session: &Session,
    coupon: &AppliedCoupon,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::APPLIED_COUPON, coupon).await
}

/// Forget the applied coupon.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_coupon(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<AppliedCoupon>(keys::APPLIED_COUPON)
        .await?;
    Ok(())
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in customer and backend token.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for the coupon applied to the cart.
    pub const APPLIED_COUPON: &str = "applied_coupon";

    /// Key for the one-shot notice.
    pub const FLASH: &str = "flash";

    /// Key for the page to return to after login.
    pub const RETURN_TO: &str = "return_to";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use shuttle_house_core::Price;
    use shuttle_house_core::cart::CouponCode;
    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_flash_is_shown_once() {
        let session = session();
        Flash::success("Đã thêm vào giỏ hàng").set(&session).await;

        let flash = Flash::take(&session).await.unwrap();
        assert_eq!(flash.kind, FlashKind::Success);
        assert_eq!(flash.message, "Đã thêm vào giỏ hàng");
        assert!(Flash::take(&session).await.is_none());
    }

    #[tokio::test]
    async fn test_coupon_round_trip_and_clear() {
        let session = session();
        let coupon = AppliedCoupon {
            code: CouponCode::parse("SALE10").unwrap(),
            discount: Price::from_dong(50_000),
            validated_subtotal: Price::from_dong(500_000),
        };
        store_coupon(&session, &coupon).await.unwrap();
        assert_eq!(applied_coupon(&session).await, Some(coupon));

        clear_coupon(&session).await.unwrap();
        assert_eq!(applied_coupon(&session).await, None);
    }

    #[test]
    fn test_customer_token_not_in_debug() {
        let customer = CurrentCustomer {
            id: UserId::new(1),
            email: "lan@example.vn".to_string(),
            name: "Lan".to_string(),
            token: AccessToken::new("secret-token".to_string()),
        };
        assert!(!format!("{customer:?}").contains("secret-token"));
    }
}

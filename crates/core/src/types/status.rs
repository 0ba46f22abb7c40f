//! Status enums for orders and payments.
//!
//! Values mirror the lowercase strings the backend emits. Unknown values are
//! rejected at deserialization rather than silently mapped.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipping,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Customer-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Chờ xác nhận",
            Self::Confirmed => "Đã xác nhận",
            Self::Processing => "Đang chuẩn bị hàng",
            Self::Shipping => "Đang giao hàng",
            Self::Delivered => "Đã giao hàng",
            Self::Cancelled => "Đã hủy",
            Self::Returned => "Đã hoàn trả",
        }
    }

    /// Customers may cancel only before the shop has confirmed the order.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Reviews are accepted only for delivered orders.
    #[must_use]
    pub const fn allows_review(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Position in the tracking timeline, or `None` for terminal off-path states.
    #[must_use]
    pub const fn timeline_step(&self) -> Option<usize> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipping => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled | Self::Returned => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Customer-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unpaid => "Chưa thanh toán",
            Self::Pending => "Đang chờ thanh toán",
            Self::Paid => "Đã thanh toán",
            Self::Failed => "Thanh toán thất bại",
            Self::Refunded => "Đã hoàn tiền",
        }
    }

    /// Whether the customer can (re)start an online payment.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Paid | Self::Refunded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_wire_format() {
        let status: OrderStatus = serde_json::from_str("\"shipping\"").unwrap();
        assert_eq!(status, OrderStatus::Shipping);
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert!(serde_json::from_str::<OrderStatus>("\"lost\"").is_err());
    }

    #[test]
    fn test_only_pending_orders_are_cancellable() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(!OrderStatus::Confirmed.is_cancellable());
        assert!(!OrderStatus::Delivered.is_cancellable());
    }

    #[test]
    fn test_timeline_steps() {
        assert_eq!(OrderStatus::Pending.timeline_step(), Some(0));
        assert_eq!(OrderStatus::Delivered.timeline_step(), Some(4));
        assert_eq!(OrderStatus::Cancelled.timeline_step(), None);
    }

    #[test]
    fn test_payment_settled() {
        assert!(PaymentStatus::Paid.is_settled());
        assert!(!PaymentStatus::Failed.is_settled());
        assert!(!PaymentStatus::Unpaid.is_settled());
    }
}

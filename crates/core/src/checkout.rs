//! Checkout input validation and payment-method branching.

use serde::{Deserialize, Serialize};

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery, settled outside the app.
    #[default]
    Cod,
    /// Manual bank transfer using the order code as reference.
    BankTransfer,
    /// E-wallet (`MoMo`) hosted payment page.
    EWallet,
    /// Card / ATM gateway (`VNPay`) hosted payment page.
    CardGateway,
}

impl PaymentMethod {
    pub const ALL: [Self; 4] = [Self::Cod, Self::BankTransfer, Self::EWallet, Self::CardGateway];

    /// Customer-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Cod => "Thanh toán khi nhận hàng (COD)",
            Self::BankTransfer => "Chuyển khoản ngân hàng",
            Self::EWallet => "Ví MoMo",
            Self::CardGateway => "Thẻ ATM / Visa / Master (VNPay)",
        }
    }

    /// Value used in form fields and on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::BankTransfer => "bank_transfer",
            Self::EWallet => "e_wallet",
            Self::CardGateway => "card_gateway",
        }
    }

    /// What happens after the order record has been created.
    #[must_use]
    pub const fn flow(&self) -> PostOrderFlow {
        match self {
            Self::Cod => PostOrderFlow::Complete,
            Self::BankTransfer => PostOrderFlow::BankInstructions,
            Self::EWallet => PostOrderFlow::GatewayRedirect(Gateway::Momo),
            Self::CardGateway => PostOrderFlow::GatewayRedirect(Gateway::Vnpay),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("invalid payment method: {s}"))
    }
}

/// External hosted payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gateway {
    Momo,
    Vnpay,
}

impl Gateway {
    /// Path segment of the backend payment-creation endpoint.
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        match self {
            Self::Momo => "momo",
            Self::Vnpay => "vnpay",
        }
    }
}

/// Post-creation branch of the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOrderFlow {
    /// Order is done; show the success page.
    Complete,
    /// Show bank account and transfer reference.
    BankInstructions,
    /// Ask the backend for a hosted payment URL and send the customer there.
    GatewayRedirect(Gateway),
}

/// Validation failures for the shipping form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShippingError {
    #[error("Vui lòng nhập họ tên người nhận")]
    MissingName,
    #[error("Số điện thoại phải gồm 10 chữ số và bắt đầu bằng 0")]
    InvalidPhone,
    #[error("Vui lòng nhập địa chỉ giao hàng")]
    MissingAddress,
    #[error("Ghi chú tối đa {max} ký tự")]
    NoteTooLong { max: usize },
}

/// Recipient and delivery address for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub note: Option<String>,
}

impl ShippingDetails {
    pub const MAX_NOTE_LENGTH: usize = 500;

    /// Trim and validate raw form input.
    ///
    /// Phone numbers may be typed with spaces, dots or a `+84` prefix; they
    /// are normalised to the 10-digit domestic form.
    ///
    /// # Errors
    ///
    /// Returns the first [`ShippingError`] found.
    pub fn validate(
        full_name: &str,
        phone: &str,
        address: &str,
        note: Option<&str>,
    ) -> Result<Self, ShippingError> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(ShippingError::MissingName);
        }

        let phone = normalize_phone(phone).ok_or(ShippingError::InvalidPhone)?;

        let address = address.trim();
        if address.is_empty() {
            return Err(ShippingError::MissingAddress);
        }

        let note = note.map(str::trim).filter(|n| !n.is_empty());
        if let Some(n) = note
            && n.chars().count() > Self::MAX_NOTE_LENGTH
        {
            return Err(ShippingError::NoteTooLong {
                max: Self::MAX_NOTE_LENGTH,
            });
        }

        Ok(Self {
            full_name: full_name.to_string(),
            phone,
            address: address.to_string(),
            note: note.map(str::to_string),
        })
    }
}

/// Normalise a Vietnamese mobile number to `0xxxxxxxxx`.
#[must_use]
pub fn normalize_phone(input: &str) -> Option<String> {
    let digits: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-'))
        .collect();

    let local = match digits.strip_prefix("+84") {
        Some(rest) => format!("0{rest}"),
        None => digits,
    };

    (local.len() == 10 && local.starts_with('0') && local.chars().all(|c| c.is_ascii_digit()))
        .then_some(local)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_flows() {
        assert_eq!(PaymentMethod::Cod.flow(), PostOrderFlow::Complete);
        assert_eq!(
            PaymentMethod::BankTransfer.flow(),
            PostOrderFlow::BankInstructions
        );
        assert_eq!(
            PaymentMethod::EWallet.flow(),
            PostOrderFlow::GatewayRedirect(Gateway::Momo)
        );
        assert_eq!(
            PaymentMethod::CardGateway.flow(),
            PostOrderFlow::GatewayRedirect(Gateway::Vnpay)
        );
    }

    #[test]
    fn test_payment_method_from_str() {
        assert_eq!(
            "bank_transfer".parse::<PaymentMethod>(),
            Ok(PaymentMethod::BankTransfer)
        );
        assert!("paypal".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("0912 345 678").as_deref(), Some("0912345678"));
        assert_eq!(normalize_phone("+84912345678").as_deref(), Some("0912345678"));
        assert_eq!(normalize_phone("0912.345.678").as_deref(), Some("0912345678"));
        assert_eq!(normalize_phone("912345678"), None);
        assert_eq!(normalize_phone("09123456ab"), None);
    }

    #[test]
    fn test_shipping_validation() {
        let ok = ShippingDetails::validate(" Nguyễn Văn A ", "0912345678", " 12 Lê Lợi ", Some("  "))
            .unwrap();
        assert_eq!(ok.full_name, "Nguyễn Văn A");
        assert_eq!(ok.address, "12 Lê Lợi");
        assert_eq!(ok.note, None);

        assert_eq!(
            ShippingDetails::validate("", "0912345678", "x", None),
            Err(ShippingError::MissingName)
        );
        assert_eq!(
            ShippingDetails::validate("A", "123", "x", None),
            Err(ShippingError::InvalidPhone)
        );
        assert_eq!(
            ShippingDetails::validate("A", "0912345678", " ", None),
            Err(ShippingError::MissingAddress)
        );
        let long_note = "x".repeat(501);
        assert_eq!(
            ShippingDetails::validate("A", "0912345678", "x", Some(&long_note)),
            Err(ShippingError::NoteTooLong { max: 500 })
        );
    }
}

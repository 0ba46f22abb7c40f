//! Cart totals and coupon discount derivation.
//!
//! The backend is the authority on what a coupon is worth; these rules only
//! turn the server-reported discount into the numbers the cart and checkout
//! pages display. The one invariant enforced here is that the payable total
//! never goes below zero.

use serde::{Deserialize, Serialize};

use crate::types::Price;

/// Maximum length accepted for a coupon code.
pub const MAX_COUPON_CODE_LENGTH: usize = 32;

/// A line that contributes `unit_price × quantity` to the subtotal.
pub trait PricedLine {
    /// Price of a single unit.
    fn unit_price(&self) -> Price;
    /// Number of units on the line.
    fn quantity(&self) -> u32;

    /// `unit_price × quantity`.
    fn line_total(&self) -> Price {
        self.unit_price() * self.quantity()
    }
}

/// Derived cart figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    /// Σ(unit price × quantity).
    pub subtotal: Price,
    /// Discount actually applied, never more than the subtotal.
    pub discount: Price,
    /// `subtotal - discount`, floored at zero.
    pub total: Price,
    /// Σ quantity.
    pub item_count: u32,
    /// Number of distinct lines.
    pub line_count: usize,
}

impl CartTotals {
    /// Compute totals for `lines` with an optional server-reported discount.
    #[must_use]
    pub fn compute<L: PricedLine>(lines: &[L], discount: Option<Price>) -> Self {
        let subtotal: Price = lines.iter().map(PricedLine::line_total).sum();
        let item_count = lines
            .iter()
            .map(PricedLine::quantity)
            .fold(0_u32, u32::saturating_add);
        let discount = discount.unwrap_or(Price::ZERO).min(subtotal);

        Self {
            subtotal,
            discount,
            total: subtotal.saturating_sub(discount),
            item_count,
            line_count: lines.len(),
        }
    }

    /// Returns `true` if there is nothing to check out.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.line_count == 0
    }
}

/// Errors from coupon code input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponCodeError {
    #[error("Vui lòng nhập mã giảm giá")]
    Empty,
    #[error("Mã giảm giá không hợp lệ")]
    TooLong,
    #[error("Mã giảm giá chỉ gồm chữ và số")]
    InvalidCharacters,
}

/// A normalised coupon code (trimmed, upper-cased, alphanumeric plus `-`/`_`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CouponCode(String);

impl CouponCode {
    /// Normalise user input into a coupon code.
    ///
    /// # Errors
    ///
    /// Returns [`CouponCodeError`] for empty, over-long, or non-alphanumeric input.
    pub fn parse(input: &str) -> Result<Self, CouponCodeError> {
        let code = input.trim().to_uppercase();
        if code.is_empty() {
            return Err(CouponCodeError::Empty);
        }
        if code.len() > MAX_COUPON_CODE_LENGTH {
            return Err(CouponCodeError::TooLong);
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CouponCodeError::InvalidCharacters);
        }
        Ok(Self(code))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CouponCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A coupon the backend accepted, as kept in the visitor's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub code: CouponCode,
    /// Discount the backend reported for the subtotal it validated against.
    pub discount: Price,
    /// Subtotal the discount was validated against.
    pub validated_subtotal: Price,
}

impl AppliedCoupon {
    /// Whether the cart changed since the backend last priced this coupon.
    #[must_use]
    pub fn is_stale_for(&self, subtotal: Price) -> bool {
        self.validated_subtotal != subtotal
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Line(i64, u32);

    impl PricedLine for Line {
        fn unit_price(&self) -> Price {
            Price::from_dong(self.0)
        }
        fn quantity(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn test_subtotal_is_sum_of_price_times_quantity() {
        let lines = [Line(1_200_000, 1), Line(85_000, 3)];
        let totals = CartTotals::compute(&lines, None);
        assert_eq!(totals.subtotal, Price::from_dong(1_455_000));
        assert_eq!(totals.total, totals.subtotal);
        assert_eq!(totals.item_count, 4);
        assert_eq!(totals.line_count, 2);
    }

    #[test]
    fn test_adding_a_line_increases_count_and_subtotal() {
        let mut lines = vec![Line(300_000, 1)];
        let before = CartTotals::compute(&lines, None);
        lines.push(Line(150_000, 1));
        let after = CartTotals::compute(&lines, None);

        assert_eq!(after.item_count, before.item_count + 1);
        assert_eq!(after.subtotal, before.subtotal + Price::from_dong(150_000));
    }

    #[test]
    fn test_discount_reduces_total_exactly() {
        let lines = [Line(500_000, 2)];
        let totals = CartTotals::compute(&lines, Some(Price::from_dong(100_000)));
        assert_eq!(totals.discount, Price::from_dong(100_000));
        assert_eq!(totals.total, Price::from_dong(900_000));
    }

    #[test]
    fn test_discount_never_drives_total_negative() {
        let lines = [Line(50_000, 1)];
        let totals = CartTotals::compute(&lines, Some(Price::from_dong(200_000)));
        assert_eq!(totals.discount, Price::from_dong(50_000));
        assert_eq!(totals.total, Price::ZERO);
    }

    #[test]
    fn test_empty_cart() {
        let lines: [Line; 0] = [];
        let totals = CartTotals::compute(&lines, Some(Price::from_dong(10_000)));
        assert!(totals.is_empty());
        assert_eq!(totals.total, Price::ZERO);
        assert_eq!(totals.discount, Price::ZERO);
    }

    #[test]
    fn test_coupon_code_normalises() {
        assert_eq!(CouponCode::parse("  sale10 ").unwrap().as_str(), "SALE10");
        assert_eq!(CouponCode::parse(" "), Err(CouponCodeError::Empty));
        assert_eq!(
            CouponCode::parse("giảm giá"),
            Err(CouponCodeError::InvalidCharacters)
        );
        assert_eq!(
            CouponCode::parse(&"A".repeat(40)),
            Err(CouponCodeError::TooLong)
        );
    }

    #[test]
    fn test_applied_coupon_staleness() {
        let applied = AppliedCoupon {
            code: CouponCode::parse("SALE10").unwrap(),
            discount: Price::from_dong(50_000),
            validated_subtotal: Price::from_dong(500_000),
        };
        assert!(!applied.is_stale_for(Price::from_dong(500_000)));
        assert!(applied.is_stale_for(Price::from_dong(400_000)));
    }
}

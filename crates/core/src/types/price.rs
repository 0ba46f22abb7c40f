//! Type-safe VND price representation using decimal arithmetic.
//!
//! The shop sells in Vietnamese dong only. Amounts are kept as
//! [`rust_decimal::Decimal`] so that `price × quantity` sums never drift, and
//! are rendered the way Vietnamese shoppers expect: dot-grouped thousands and
//! a trailing `₫` (e.g. `1.250.000₫`).

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Sub};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A non-negative VND amount.
///
/// Deserialization goes through [`Price::new`], so a negative backend value
/// arrives as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Zero dong.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price, clamping negative amounts to zero.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.max(Decimal::ZERO))
    }

    /// Create a price from a whole number of dong.
    #[must_use]
    pub fn from_dong(dong: i64) -> Self {
        Self::new(Decimal::from(dong))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whole dong, rounded half away from zero.
    #[must_use]
    pub fn to_dong(&self) -> i64 {
        self.0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Returns `true` if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, flooring at zero instead of going negative.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self::new(self.0 - other.0)
    }

    /// Format for display, e.g. `1.250.000₫`.
    #[must_use]
    pub fn display(&self) -> String {
        let whole = self
            .0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .trunc()
            .to_string();

        let digits: Vec<char> = whole.chars().collect();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 3);
        for (i, ch) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(*ch);
        }
        grouped.push('₫');
        grouped
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Price {
    type Output = Self;

    /// Floors at zero; a price is never negative.
    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self::Output {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Price::from_dong(0).display(), "0₫");
        assert_eq!(Price::from_dong(999).display(), "999₫");
        assert_eq!(Price::from_dong(1_000).display(), "1.000₫");
        assert_eq!(Price::from_dong(1_250_000).display(), "1.250.000₫");
        assert_eq!(Price::from_dong(12_345_678).display(), "12.345.678₫");
    }

    #[test]
    fn test_display_rounds_fractional_dong() {
        let price = Price::new(Decimal::new(15_005, 1)); // 1500.5
        assert_eq!(price.display(), "1.501₫");
    }

    #[test]
    fn test_to_dong() {
        assert_eq!(Price::new(Decimal::new(15_005, 1)).to_dong(), 1_501);
        assert_eq!(Price::from_dong(250_000).to_dong(), 250_000);
    }

    #[test]
    fn test_negative_amounts_clamp_to_zero() {
        assert_eq!(Price::from_dong(-5), Price::ZERO);
        assert_eq!(Price::from_dong(100) - Price::from_dong(300), Price::ZERO);
    }

    #[test]
    fn test_multiply_and_sum() {
        let lines = [Price::from_dong(250_000) * 2, Price::from_dong(90_000) * 3];
        let total: Price = lines.into_iter().sum();
        assert_eq!(total, Price::from_dong(770_000));
    }

    #[test]
    fn test_deserializes_from_number_or_string() {
        let from_number: Price = serde_json::from_str("1250000").unwrap_or_default();
        let from_string: Price = serde_json::from_str("\"1250000\"").unwrap_or_default();
        assert_eq!(from_number, Price::from_dong(1_250_000));
        assert_eq!(from_string, Price::from_dong(1_250_000));
    }

    #[test]
    fn test_negative_backend_amount_decodes_as_zero() {
        let from_number: Price = serde_json::from_str("-5").unwrap();
        let from_string: Price = serde_json::from_str("\"-120000.5\"").unwrap();
        assert_eq!(from_number, Price::ZERO);
        assert_eq!(from_string, Price::ZERO);
    }

    #[test]
    fn test_serializes_as_decimal_string() {
        assert_eq!(
            serde_json::to_string(&Price::from_dong(90_000)).unwrap(),
            "\"90000\""
        );
    }
}

//! Variant selection and stock validation for add-to-cart / buy-now.
//!
//! A product either exposes size variants, each with its own stock, or sells
//! from a single aggregate stock count. The same guard runs when the product
//! page renders (to disable the buttons) and when the purchase form is
//! submitted (before anything reaches the backend). The backend still has
//! the final say.

use serde::Serialize;

use crate::types::VariantId;

/// Stock of one purchasable variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantStock {
    pub id: VariantId,
    pub stock: u32,
}

/// Where the stock count for a purchase comes from.
#[derive(Debug, Clone, Copy)]
pub enum StockSource<'a> {
    /// Product sold in sizes; one of them must be chosen.
    Variants(&'a [VariantStock]),
    /// Product without variants; uses the product's own stock.
    Aggregate(u32),
}

impl<'a> StockSource<'a> {
    /// Pick the variant source when `variants` is non-empty, aggregate otherwise.
    #[must_use]
    pub const fn for_product(variants: &'a [VariantStock], aggregate: u32) -> Self {
        if variants.is_empty() {
            Self::Aggregate(aggregate)
        } else {
            Self::Variants(variants)
        }
    }
}

/// Why a purchase is blocked.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockError {
    #[error("Vui lòng chọn kích cỡ")]
    VariantRequired,
    #[error("Kích cỡ đã chọn không tồn tại")]
    UnknownVariant,
    #[error("Sản phẩm đã hết hàng")]
    OutOfStock,
    #[error("Chỉ còn {available} sản phẩm trong kho")]
    InsufficientStock { available: u32 },
    #[error("Số lượng phải lớn hơn 0")]
    InvalidQuantity,
}

/// A purchase that passed the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseCheck {
    /// Variant to put in the cart, if the product has variants.
    pub variant: Option<VariantId>,
    pub quantity: u32,
    /// Stock the check was made against.
    pub available: u32,
}

impl PurchaseCheck {
    /// Run the guard clauses in order: variant chosen, variant exists, quantity
    /// positive, stock non-zero, stock covers quantity.
    ///
    /// # Errors
    ///
    /// Returns the first [`StockError`] that applies.
    pub fn evaluate(
        source: StockSource<'_>,
        selected: Option<VariantId>,
        quantity: u32,
    ) -> Result<Self, StockError> {
        let (variant, available) = match source {
            StockSource::Variants(variants) => {
                let id = selected.ok_or(StockError::VariantRequired)?;
                let variant = variants
                    .iter()
                    .find(|v| v.id == id)
                    .ok_or(StockError::UnknownVariant)?;
                (Some(variant.id), variant.stock)
            }
            StockSource::Aggregate(stock) => (None, stock),
        };

        if quantity == 0 {
            return Err(StockError::InvalidQuantity);
        }
        if available == 0 {
            return Err(StockError::OutOfStock);
        }
        if available < quantity {
            return Err(StockError::InsufficientStock { available });
        }

        Ok(Self {
            variant,
            quantity,
            available,
        })
    }
}

/// Clamp a requested quantity into `1..=available` for quantity steppers.
#[must_use]
pub fn clamp_quantity(requested: u32, available: u32) -> u32 {
    requested.clamp(1, available.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes() -> Vec<VariantStock> {
        vec![
            VariantStock {
                id: VariantId::new(1),
                stock: 0,
            },
            VariantStock {
                id: VariantId::new(2),
                stock: 3,
            },
        ]
    }

    #[test]
    fn test_variant_required_when_product_has_sizes() {
        let variants = sizes();
        let result = PurchaseCheck::evaluate(StockSource::Variants(&variants), None, 1);
        assert_eq!(result, Err(StockError::VariantRequired));
    }

    #[test]
    fn test_zero_stock_variant_blocks_purchase() {
        let variants = sizes();
        let result =
            PurchaseCheck::evaluate(StockSource::Variants(&variants), Some(VariantId::new(1)), 1);
        assert_eq!(result, Err(StockError::OutOfStock));
    }

    #[test]
    fn test_in_stock_variant_allows_purchase() {
        let variants = sizes();
        let check =
            PurchaseCheck::evaluate(StockSource::Variants(&variants), Some(VariantId::new(2)), 2);
        assert_eq!(
            check,
            Ok(PurchaseCheck {
                variant: Some(VariantId::new(2)),
                quantity: 2,
                available: 3,
            })
        );
    }

    #[test]
    fn test_quantity_above_variant_stock() {
        let variants = sizes();
        let result =
            PurchaseCheck::evaluate(StockSource::Variants(&variants), Some(VariantId::new(2)), 4);
        assert_eq!(result, Err(StockError::InsufficientStock { available: 3 }));
    }

    #[test]
    fn test_unknown_variant() {
        let variants = sizes();
        let result =
            PurchaseCheck::evaluate(StockSource::Variants(&variants), Some(VariantId::new(9)), 1);
        assert_eq!(result, Err(StockError::UnknownVariant));
    }

    #[test]
    fn test_aggregate_stock_without_variants() {
        let source = StockSource::for_product(&[], 5);
        assert!(PurchaseCheck::evaluate(source, None, 5).is_ok());
        assert_eq!(
            PurchaseCheck::evaluate(source, None, 6),
            Err(StockError::InsufficientStock { available: 5 })
        );
        assert_eq!(
            PurchaseCheck::evaluate(StockSource::Aggregate(0), None, 1),
            Err(StockError::OutOfStock)
        );
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert_eq!(
            PurchaseCheck::evaluate(StockSource::Aggregate(5), None, 0),
            Err(StockError::InvalidQuantity)
        );
    }

    #[test]
    fn test_clamp_quantity() {
        assert_eq!(clamp_quantity(0, 5), 1);
        assert_eq!(clamp_quantity(9, 5), 5);
        assert_eq!(clamp_quantity(3, 0), 1);
    }
}

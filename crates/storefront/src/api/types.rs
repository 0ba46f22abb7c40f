//! Request and response types for the REST backend.
//!
//! Field names follow the backend's camelCase JSON. Optional collections
//! default to empty so older backend builds that omit them still decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shuttle_house_core::cart::PricedLine;
use shuttle_house_core::catalog::PageMeta;
use shuttle_house_core::checkout::{PaymentMethod, ShippingDetails};
use shuttle_house_core::stock::VariantStock;
use shuttle_house_core::{
    CartItemId, CategoryId, BrandId, OrderId, OrderStatus, PaymentStatus, Price, ProductId, Rating,
    ReviewId, UserId, VariantId,
};

// =============================================================================
// Catalog
// =============================================================================

/// Brand or category reference used as a listing facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Brand reference embedded in a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandRef {
    pub id: BrandId,
    pub name: String,
    pub slug: String,
}

/// Category reference embedded in a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// A size option with its own stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: VariantId,
    /// Size label, e.g. `3U G5` or `41`.
    #[serde(alias = "name")]
    pub size: String,
    #[serde(default)]
    pub stock: u32,
    /// Variant-specific price, when it differs from the product price.
    #[serde(default)]
    pub price: Option<Price>,
}

impl Variant {
    #[must_use]
    pub const fn stock_entry(&self) -> VariantStock {
        VariantStock {
            id: self.id,
            stock: self.stock,
        }
    }
}

/// A technical attribute, e.g. weight `4U` or balance `head-heavy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAttribute {
    pub name: String,
    pub value: String,
}

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub sale_price: Option<Price>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub brand: Option<BrandRef>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    /// Aggregate stock; used when the product has no variants.
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub attributes: Vec<ProductAttribute>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub sold: u32,
}

impl Product {
    /// Price the customer pays: the sale price when it undercuts the list price.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        match self.sale_price {
            Some(sale) if sale < self.price && !sale.is_zero() => sale,
            _ => self.price,
        }
    }

    /// List price to strike through, if on sale.
    #[must_use]
    pub fn compare_at_price(&self) -> Option<Price> {
        (self.effective_price() < self.price).then_some(self.price)
    }

    /// Price of a given variant, falling back to the product price.
    #[must_use]
    pub fn price_for(&self, variant: Option<VariantId>) -> Price {
        variant
            .and_then(|id| self.variants.iter().find(|v| v.id == id))
            .and_then(|v| v.price)
            .unwrap_or_else(|| self.effective_price())
    }

    /// Stock entries of all variants.
    #[must_use]
    pub fn variant_stock(&self) -> Vec<VariantStock> {
        self.variants.iter().map(Variant::stock_entry).collect()
    }

    /// Total sellable units across variants (or aggregate stock).
    #[must_use]
    pub fn total_stock(&self) -> u32 {
        if self.variants.is_empty() {
            self.stock
        } else {
            self.variants
                .iter()
                .map(|v| v.stock)
                .fold(0, u32::saturating_add)
        }
    }

    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Product list response: the paged endpoint returns products with
/// pagination metadata, the unpaged variant returns a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProductListResponse {
    Paged {
        products: Vec<Product>,
        pagination: PageMeta,
    },
    Unpaged(Vec<Product>),
}

// =============================================================================
// Cart
// =============================================================================

/// Product summary embedded in a cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// Variant summary embedded in a cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartVariant {
    pub id: VariantId,
    #[serde(alias = "name")]
    pub size: String,
}

/// One line of the customer's cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product: CartProduct,
    #[serde(default)]
    pub variant: Option<CartVariant>,
    /// Unit price at the time of reading the cart.
    pub price: Price,
    pub quantity: u32,
    /// Remaining stock for this line's product/variant, when reported.
    #[serde(default)]
    pub stock: Option<u32>,
}

impl PricedLine for CartItem {
    fn unit_price(&self) -> Price {
        self.price
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// The customer's server-side cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

/// Body of `POST /api/cart/items`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItem {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

/// Result of `POST /api/coupons/validate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponValidation {
    pub valid: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub discount_amount: Price,
}

// =============================================================================
// Orders & payments
// =============================================================================

/// Body of `POST /api/orders`; the backend builds lines from the cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

/// One line of a placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(default)]
    pub product_slug: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub price: Price,
    pub quantity: u32,
}

impl PricedLine for OrderItem {
    fn unit_price(&self) -> Price {
        self.price
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    /// Human-facing order code, also the bank transfer reference.
    pub code: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub subtotal: Price,
    #[serde(default)]
    pub discount: Price,
    #[serde(default)]
    pub shipping_fee: Price,
    pub total: Price,
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Whether an online payment can still be started for this order.
    #[must_use]
    pub const fn awaits_online_payment(&self) -> bool {
        matches!(
            self.payment_method,
            PaymentMethod::EWallet | PaymentMethod::CardGateway
        ) && !self.payment_status.is_settled()
            && !matches!(self.status, OrderStatus::Cancelled | OrderStatus::Returned)
    }
}

/// Body of `POST /api/payments/{provider}/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    pub order_id: OrderId,
    pub return_url: String,
}

/// Hosted payment page returned by the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    #[serde(alias = "payUrl")]
    pub payment_url: String,
}

// =============================================================================
// Reviews & wishlist
// =============================================================================

/// A product review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub user_name: String,
    pub rating: Rating,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/reviews`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub product_id: ProductId,
    pub rating: Rating,
    pub comment: String,
}

/// Body of `POST /api/wishlist`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistAdd {
    pub product_id: ProductId,
}

// =============================================================================
// Account
// =============================================================================

/// A customer account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Login / registration response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Body of `PUT /api/users/profile`.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Body of `PUT /api/users/change-password`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn racket_json() -> &'static str {
        r#"{
            "id": 12,
            "name": "Yonex Astrox 99 Pro",
            "slug": "yonex-astrox-99-pro",
            "price": 4200000,
            "salePrice": 3890000,
            "images": ["https://cdn.shuttlehouse.vn/ax99.jpg"],
            "brand": {"id": 1, "name": "Yonex", "slug": "yonex"},
            "variants": [
                {"id": 101, "size": "3U G5", "stock": 0},
                {"id": 102, "name": "4U G5", "stock": 4, "price": 3990000}
            ]
        }"#
    }

    #[test]
    fn test_product_decodes_with_defaults() {
        let product: Product = serde_json::from_str(racket_json()).unwrap();
        assert_eq!(product.variants.len(), 2);
        assert_eq!(product.variants[1].size, "4U G5");
        assert!(product.attributes.is_empty());
        assert_eq!(product.review_count, 0);
        assert_eq!(product.total_stock(), 4);
    }

    #[test]
    fn test_product_pricing() {
        let product: Product = serde_json::from_str(racket_json()).unwrap();
        assert_eq!(product.effective_price(), Price::from_dong(3_890_000));
        assert_eq!(product.compare_at_price(), Some(Price::from_dong(4_200_000)));
        assert_eq!(
            product.price_for(Some(VariantId::new(102))),
            Price::from_dong(3_990_000)
        );
        assert_eq!(
            product.price_for(Some(VariantId::new(101))),
            Price::from_dong(3_890_000)
        );
    }

    #[test]
    fn test_product_list_response_shapes() {
        let paged = format!(
            r#"{{"products":[{}],"pagination":{{"page":1,"limit":12,"total":1,"totalPages":1}}}}"#,
            racket_json()
        );
        assert!(matches!(
            serde_json::from_str::<ProductListResponse>(&paged).unwrap(),
            ProductListResponse::Paged { .. }
        ));

        let unpaged = format!("[{}]", racket_json());
        assert!(matches!(
            serde_json::from_str::<ProductListResponse>(&unpaged).unwrap(),
            ProductListResponse::Unpaged(_)
        ));
    }

    #[test]
    fn test_create_order_flattens_shipping() {
        let body = CreateOrder {
            shipping: ShippingDetails::validate("Lan", "0912345678", "1 Hai Bà Trưng", None)
                .unwrap(),
            payment_method: PaymentMethod::BankTransfer,
            coupon_code: Some("SALE10".to_string()),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["fullName"], "Lan");
        assert_eq!(json["paymentMethod"], "bank_transfer");
        assert_eq!(json["couponCode"], "SALE10");
    }

    #[test]
    fn test_order_awaits_online_payment() {
        let json = r#"{
            "id": 5, "code": "SH0005", "status": "pending", "paymentStatus": "unpaid",
            "paymentMethod": "e_wallet", "subtotal": 100000, "total": 100000,
            "fullName": "Lan", "phone": "0912345678", "address": "HN",
            "createdAt": "2026-10-01T08:00:00Z"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert!(order.awaits_online_payment());
        assert_eq!(order.shipping.full_name, "Lan");
    }
}

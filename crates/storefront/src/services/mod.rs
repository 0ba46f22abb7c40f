//! Business logic services for storefront.
//!
//! # Services
//!
//! - `coupon` - Coupon application and re-validation after cart changes
//! - `checkout` - Order placement and payment-method branching
//!
//! Services talk to the backend through small traits ([`coupon::CouponApi`],
//! [`checkout::CheckoutApi`]) implemented by [`crate::api::ApiClient`], so the
//! branching rules can be tested against in-memory fakes.

pub mod checkout;
pub mod coupon;

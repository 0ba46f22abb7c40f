//! Shuttle House Core - Shared domain types and storefront rules.
//!
//! This crate provides the types and pure derivation rules used by the
//! storefront binary:
//! - `storefront` - Public-facing badminton equipment shop
//! - `integration-tests` - Black-box tests against a running storefront
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no sessions. Everything authoritative (pricing, inventory, order
//! persistence) lives in the REST backend; the rules here mirror it
//! optimistically so pages can render the right state without a round trip.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, ratings and statuses
//! - [`cart`] - Cart totals and coupon discount clamping
//! - [`stock`] - Variant selection and stock validation
//! - [`catalog`] - Product listing filters and pagination
//! - [`checkout`] - Shipping details and payment-method branching

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod stock;
pub mod types;

pub use checkout::PaymentMethod;
pub use types::*;

//! Session-held models for storefront.
//!
//! The storefront keeps no business data of its own; everything here lives
//! in the visitor's session.

pub mod session;

pub use session::{CurrentCustomer, Flash, FlashKind, keys as session_keys};

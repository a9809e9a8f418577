//! Edubook Core - Shared domain types.
//!
//! This crate provides the types used across all Edubook components:
//! - `storefront` - JSON API server (cart, checkout, order lifecycle)
//! - `cli` - Command-line tools for migrations and order administration
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. The order status transition table lives here so
//! every binary enforces the same lifecycle.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, quantities, order numbers and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

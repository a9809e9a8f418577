//! Edubook Storefront library.
//!
//! Cart management, checkout and the order status lifecycle for the Edubook
//! bookstore, exposed as a JSON API. The binary in `main.rs` wires these
//! modules to `PostgreSQL` and Stripe; tests wire them to
//! [`db::MemoryStore`] and a fake gateway.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

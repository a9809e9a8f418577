//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod cart;
pub mod order;
pub mod principal;
pub mod product;

pub use cart::{CartItem, CartLine, CartSnapshot};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderDetail, OrderItem, ShippingDetails, ShippingForm,
    StatusChange, StatusCount, StoreStats,
};
pub use principal::Principal;
pub use product::Product;

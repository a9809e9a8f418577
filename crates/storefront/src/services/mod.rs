//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Bearer token verification
//! - `cart` - Cart operations and the cart snapshot reader
//! - `checkout` - Order creation from a cart
//! - `orders` - Order queries and status lifecycle
//! - `payment` - Payment gateway seam
//! - `stripe` - Stripe `PaymentIntents` gateway

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod payment;
pub mod stripe;

pub use auth::{AuthError, TokenVerifier};
pub use cart::{CartError, CartService};
pub use checkout::{CheckoutError, CheckoutReceipt, CheckoutService, CheckoutSettings};
pub use orders::{OrderError, OrderService};
pub use payment::{Authorization, AuthorizationRequest, PaymentError, PaymentGateway};
pub use stripe::StripeClient;

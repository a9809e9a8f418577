//! Integration tests for Edubook.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p edubook-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout` - Order creation from carts, payment failure, concurrency
//! - `order_lifecycle` - Administrative status transitions and visibility
//! - `postgres_store` - The same guarantees against a real database
//!
//! Most tests run the storefront services against [`MemoryStore`] and a
//! [`ScriptedGateway`], so they need no database or network. The
//! `postgres_store` tests are ignored by default and need `DATABASE_URL`:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/edubook_test \
//!     cargo test -p edubook-integration-tests -- --ignored
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;

use edubook_core::{Quantity, Role};
use edubook_storefront::db::{CartStore, MemoryStore};
use edubook_storefront::models::{Principal, Product, ShippingForm};
use edubook_storefront::services::{
    Authorization, AuthorizationRequest, CartService, CheckoutService, CheckoutSettings,
    OrderService, PaymentError, PaymentGateway,
};

/// What the gateway does on one call.
#[derive(Debug, Clone)]
pub enum Outcome {
    Approve,
    Decline,
    /// Sleep this long before approving.
    Delay(Duration),
}

/// Payment gateway that replays a script of outcomes, then approves.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<VecDeque<Outcome>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            calls: Arc::default(),
        }
    }

    /// Number of authorization requests received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Outcome {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Outcome::Approve)
    }
}

impl PaymentGateway for ScriptedGateway {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<Authorization, PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_outcome() {
            Outcome::Approve => {}
            Outcome::Decline => {
                return Err(PaymentError::Declined("Your card was declined.".into()));
            }
            Outcome::Delay(delay) => tokio::time::sleep(delay).await,
        }
        Ok(approval(request))
    }
}

/// Gateway that adds `product` to the buyer's cart while the authorization
/// is in flight, then approves.
#[derive(Debug, Clone)]
pub struct CartWritingGateway<S> {
    store: S,
    product: Product,
}

impl<S> CartWritingGateway<S> {
    #[must_use]
    pub const fn new(store: S, product: Product) -> Self {
        Self { store, product }
    }
}

impl<S: CartStore + 'static> PaymentGateway for CartWritingGateway<S> {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<Authorization, PaymentError> {
        let one = Quantity::new(1).map_err(|e| PaymentError::Request(e.to_string()))?;
        self.store
            .add_quantity(request.user_id, &self.product, one)
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;
        Ok(approval(request))
    }
}

fn approval(request: &AuthorizationRequest) -> Authorization {
    Authorization {
        reference: format!("pi_{}", request.order_number),
        client_secret: SecretString::from(format!("pi_{}_secret", request.order_number)),
    }
}

/// A seeded store with one customer, one admin and the services over it.
pub struct Shop {
    pub store: MemoryStore,
    pub gateway: ScriptedGateway,
    pub cart: CartService<MemoryStore>,
    pub checkout: CheckoutService<MemoryStore, ScriptedGateway>,
    pub orders: OrderService<MemoryStore>,
    pub customer: Principal,
    pub admin: Principal,
}

impl Shop {
    /// A shop whose gateway approves every payment.
    pub async fn new() -> Self {
        Self::with(ScriptedGateway::default(), CheckoutSettings::default()).await
    }

    pub async fn with(gateway: ScriptedGateway, settings: CheckoutSettings) -> Self {
        let store = MemoryStore::new();
        let customer = Principal::user(store.insert_user(Role::User).await);
        let admin = Principal::admin(store.insert_user(Role::Admin).await);
        Self {
            cart: CartService::new(store.clone()),
            checkout: CheckoutService::new(store.clone(), gateway.clone(), settings),
            orders: OrderService::new(store.clone()),
            store,
            gateway,
            customer,
            admin,
        }
    }

    /// Another customer account.
    pub async fn new_customer(&self) -> Principal {
        Principal::user(self.store.insert_user(Role::User).await)
    }

    /// Add a catalog product priced in whole currency units.
    pub async fn product(&self, name: &str, price: i64) -> Product {
        self.store.insert_product(name, Decimal::from(price)).await
    }

    /// Put `quantity` of `product` in `principal`'s cart.
    ///
    /// # Panics
    ///
    /// Panics if the quantity is out of range or the store fails.
    pub async fn add_to_cart(&self, principal: &Principal, product: &Product, quantity: i64) {
        let quantity = Quantity::new(quantity).unwrap_or_else(|e| panic!("{e}"));
        self.store
            .add_quantity(principal.id, product, quantity)
            .await
            .unwrap_or_else(|e| panic!("{e}"))
            .unwrap_or_else(|| panic!("cart line over the cap"));
    }
}

/// Valid shipping details.
#[must_use]
pub fn shipping() -> ShippingForm {
    ShippingForm {
        name: "Nguyen Van A".into(),
        phone: "0901234567".into(),
        email: Some("a@example.vn".into()),
        address: "123 Le Loi".into(),
        city: Some("Ho Chi Minh".into()),
        district: Some("Quan 1".into()),
        ward: Some("Ben Nghe".into()),
        note: None,
    }
}

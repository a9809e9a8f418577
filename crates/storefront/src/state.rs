//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::Store;
use crate::services::{
    CartService, CheckoutService, CheckoutSettings, OrderService, PaymentGateway, TokenVerifier,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and is generic over the
/// storage backend and payment gateway so tests can run the full router
/// against in-memory fakes.
pub struct AppState<S, P> {
    inner: Arc<AppStateInner<S, P>>,
}

impl<S, P> Clone for AppState<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<S, P> {
    store: S,
    verifier: TokenVerifier,
    cart: CartService<S>,
    checkout: CheckoutService<S, P>,
    orders: OrderService<S>,
}

impl<S: Store, P: PaymentGateway> AppState<S, P> {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence backend shared by every service
    /// * `gateway` - Payment gateway used at checkout
    /// * `verifier` - Bearer token verifier
    /// * `settings` - Currency, shipping fee and payment timeout
    #[must_use]
    pub fn new(
        store: S,
        gateway: P,
        verifier: TokenVerifier,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                cart: CartService::new(store.clone()),
                checkout: CheckoutService::new(store.clone(), gateway, settings),
                orders: OrderService::new(store.clone()),
                store,
                verifier,
            }),
        }
    }

    /// Get a reference to the persistence backend.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Get a reference to the bearer token verifier.
    #[must_use]
    pub fn verifier(&self) -> &TokenVerifier {
        &self.inner.verifier
    }

    #[must_use]
    pub fn cart(&self) -> &CartService<S> {
        &self.inner.cart
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService<S, P> {
        &self.inner.checkout
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService<S> {
        &self.inner.orders
    }
}

//! Checkout: turn the principal's cart into an order.
//!
//! Everything runs inside one [`CheckoutTx`]. The cart is loaded (and
//! locked), the order and its frozen items are written, the payment gateway
//! authorizes the total, the authorization reference is stored and the
//! ordered cart lines are deleted. Only then is the transaction committed.
//! Any failure drops the transaction, so no order or item survives and the
//! cart is left as it was.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, instrument, warn};

use edubook_core::{CartLineId, CurrencyCode, OrderNumber, OrderTotals, PaymentMethod, Price};

use crate::db::{CheckoutStore, CheckoutTx, RepositoryError};
use crate::models::{
    CartLine, NewOrder, NewOrderItem, Order, OrderDetail, Principal, ShippingForm,
};
use crate::services::payment::{
    Authorization, AuthorizationRequest, PaymentError, PaymentGateway,
};

/// Errors returned by [`CheckoutService::create_order`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The principal's cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// Shipping details or amounts failed validation.
    #[error("{0}")]
    Validation(String),

    /// The payment gateway refused, failed or timed out.
    #[error("payment authorization failed: {0}")]
    Payment(#[from] PaymentError),

    /// A concurrent write won (e.g. repeated order number collision).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CheckoutError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Repository(other),
        }
    }
}

/// Pricing and payment knobs for checkout.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutSettings {
    pub currency: CurrencyCode,
    /// Flat fee added to every order.
    pub shipping_fee: Decimal,
    /// Upper bound on one gateway call.
    pub payment_timeout: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::VND,
            shipping_fee: Decimal::ZERO,
            payment_timeout: Duration::from_secs(10),
        }
    }
}

/// A committed order plus the secret the client needs to confirm payment.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: OrderDetail,
    pub client_secret: SecretString,
}

/// Creates orders from carts.
pub struct CheckoutService<S, P> {
    store: S,
    gateway: Arc<P>,
    settings: CheckoutSettings,
}

impl<S: Clone, P> Clone for CheckoutService<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            gateway: Arc::clone(&self.gateway),
            settings: self.settings,
        }
    }
}

impl<S, P> CheckoutService<S, P>
where
    S: CheckoutStore,
    P: PaymentGateway,
{
    #[must_use]
    pub fn new(store: S, gateway: P, settings: CheckoutSettings) -> Self {
        Self {
            store,
            gateway: Arc::new(gateway),
            settings,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Create an order from the principal's current cart.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::Validation` if the shipping details are invalid
    /// - `CheckoutError::EmptyCart` if the cart has no lines
    /// - `CheckoutError::Payment` if authorization fails or times out
    /// - `CheckoutError::Conflict` / `CheckoutError::Repository` on storage failure
    ///
    /// In every error case nothing is persisted and the cart is unchanged.
    #[instrument(skip(self, shipping), fields(user_id = %principal.id))]
    pub async fn create_order(
        &self,
        principal: &Principal,
        shipping: ShippingForm,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let shipping = shipping.validate().map_err(CheckoutError::Validation)?;

        let mut tx = self.store.begin().await?;
        let lines = tx.load_cart(principal.id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let subtotal: Decimal = lines.iter().map(CartLine::line_total).sum();
        let totals = OrderTotals::new(subtotal, self.settings.shipping_fee, Decimal::ZERO)
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;

        let mut new_order = NewOrder {
            order_number: OrderNumber::generate(),
            user_id: principal.id,
            payment_method: PaymentMethod::Stripe,
            totals,
            shipping,
        };
        let order = match tx.save_order(&new_order).await {
            Err(RepositoryError::Conflict(_)) => {
                warn!(
                    order_number = %new_order.order_number,
                    "Order number collision, regenerating"
                );
                new_order.order_number = OrderNumber::generate();
                tx.save_order(&new_order).await?
            }
            saved => saved?,
        };
        let frozen: Vec<NewOrderItem> = lines.iter().map(NewOrderItem::freeze).collect();
        let items = tx.save_order_items(order.id, &frozen).await?;

        let authorization = self.authorize(&order).await?;

        let ordered: Vec<CartLineId> = lines.iter().map(|line| line.id).collect();
        match Self::finish(tx, &order, &authorization, principal, &ordered).await {
            Ok((order, cleared)) => {
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    total = %order.totals.total(),
                    lines = items.len(),
                    cleared,
                    "Order created"
                );
                Ok(CheckoutReceipt {
                    order: OrderDetail { order, items },
                    client_secret: authorization.client_secret,
                })
            }
            Err(err) => {
                // The processor already holds an intent for an order that no
                // longer exists.
                warn!(
                    error = %err,
                    order_number = %order.order_number,
                    payment_intent_id = %authorization.reference,
                    "Checkout rolled back after payment authorization"
                );
                Err(err)
            }
        }
    }

    async fn authorize(&self, order: &Order) -> Result<Authorization, CheckoutError> {
        let request = AuthorizationRequest {
            amount: Price::new(order.totals.total(), self.settings.currency),
            order_number: order.order_number.clone(),
            user_id: order.user_id,
        };
        let timeout = self.settings.payment_timeout;

        let result = tokio::time::timeout(timeout, self.gateway.authorize(&request))
            .await
            .unwrap_or(Err(PaymentError::Timeout(timeout)));

        result.map_err(|err| {
            warn!(
                error = %err,
                order_number = %order.order_number,
                "Payment authorization failed, rolling back checkout"
            );
            CheckoutError::Payment(err)
        })
    }

    async fn finish(
        mut tx: S::Tx,
        order: &Order,
        authorization: &Authorization,
        principal: &Principal,
        ordered: &[CartLineId],
    ) -> Result<(Order, u64), CheckoutError> {
        let order = tx
            .attach_authorization(order.id, &authorization.reference)
            .await?;
        let cleared = tx.clear_cart(principal.id, ordered).await?;
        tx.commit().await?;
        Ok((order, cleared))
    }
}

//! Order queries and the administrative status lifecycle.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};

use edubook_core::{OrderId, OrderStatus, TransitionError};

use crate::db::{OrderStore, RepositoryError};
use crate::models::{Order, OrderDetail, Principal, StatusChange, StoreStats};

/// Errors returned by [`OrderService`].
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    /// The principal may not see or change this order.
    #[error("forbidden")]
    Forbidden,

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Another update changed the status first.
    #[error("order status changed concurrently, reload and retry")]
    Conflict,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Reads orders and drives their status.
#[derive(Debug, Clone)]
pub struct OrderService<S> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Orders visible to `actor`, newest first.
    ///
    /// Admins see every order, everyone else only their own.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    #[instrument(skip(self), fields(user_id = %actor.id))]
    pub async fn list_orders(&self, actor: &Principal) -> Result<Vec<OrderDetail>, OrderError> {
        let owner = (!actor.is_admin()).then_some(actor.id);
        Ok(self.store.list_orders(owner).await?)
    }

    /// One order with its items.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id and
    /// `OrderError::Forbidden` when a non-admin asks for someone else's order.
    #[instrument(skip(self), fields(user_id = %actor.id))]
    pub async fn get_order(
        &self,
        actor: &Principal,
        id: OrderId,
    ) -> Result<OrderDetail, OrderError> {
        let detail = self.store.get_order(id).await?.ok_or(OrderError::NotFound)?;
        if !actor.is_admin() && detail.order.user_id != actor.id {
            return Err(OrderError::Forbidden);
        }
        Ok(detail)
    }

    /// Move an order one step along its lifecycle.
    ///
    /// Shipping, delivery and cancellation stamp their timestamp column;
    /// cancellation also records `reason`.
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` unless `actor` is an admin
    /// - `OrderError::NotFound` for an unknown order
    /// - `OrderError::InvalidTransition` if the transition table forbids it
    /// - `OrderError::Conflict` if a concurrent update got there first
    #[instrument(skip(self, reason), fields(user_id = %actor.id))]
    pub async fn update_order_status(
        &self,
        actor: &Principal,
        id: OrderId,
        to: OrderStatus,
        reason: Option<String>,
    ) -> Result<Order, OrderError> {
        if !actor.is_admin() {
            return Err(OrderError::Forbidden);
        }

        let current = self
            .store
            .get_order(id)
            .await?
            .ok_or(OrderError::NotFound)?
            .order
            .status;
        current.transition_to(to)?;

        let change = StatusChange::new(to, Utc::now(), reason);
        let order = self
            .store
            .transition_status(id, current, &change)
            .await?
            .ok_or(OrderError::Conflict)?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            from = %current,
            to = %order.status,
            "Order status updated"
        );
        Ok(order)
    }

    /// Dashboard counters.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Forbidden` unless `actor` is an admin.
    #[instrument(skip(self), fields(user_id = %actor.id))]
    pub async fn stats(&self, actor: &Principal) -> Result<StoreStats, OrderError> {
        if !actor.is_admin() {
            return Err(OrderError::Forbidden);
        }
        Ok(self.store.stats().await?)
    }
}

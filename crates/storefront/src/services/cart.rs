//! Cart operations and the cart snapshot reader.

use thiserror::Error;
use tracing::{debug, instrument};

use edubook_core::{CartLineId, ProductId, Quantity};

use crate::db::{CartStore, CatalogStore, RepositoryError};
use crate::models::{CartItem, CartSnapshot, Principal};

/// Errors returned by [`CartService`].
#[derive(Debug, Error)]
pub enum CartError {
    /// Bad quantity or a merge that would pass the per-line cap.
    #[error("{0}")]
    Validation(String),

    /// Unknown principal, product or cart line.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart operations for the authenticated principal.
#[derive(Debug, Clone)]
pub struct CartService<S> {
    store: S,
}

impl<S> CartService<S>
where
    S: CartStore + CatalogStore,
{
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The principal's cart lines enriched with live product data.
    ///
    /// An empty cart is a valid, empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if the principal does not exist.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn snapshot(&self, principal: &Principal) -> Result<CartSnapshot, CartError> {
        if !self.store.principal_exists(principal.id).await? {
            return Err(CartError::NotFound("user"));
        }
        let lines = self.store.cart_lines(principal.id).await?;
        Ok(CartSnapshot {
            owner: principal.id,
            lines,
        })
    }

    /// Add `quantity` units of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` for a quantity outside `1..=999` or a
    /// merge that would exceed 999, and `CartError::NotFound` for an unknown
    /// or inactive product.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn add_item(
        &self,
        principal: &Principal,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartItem, CartError> {
        let quantity = parse_quantity(quantity)?;
        let product = self
            .store
            .get_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(CartError::NotFound("product"))?;

        let item = self
            .store
            .add_quantity(principal.id, &product, quantity)
            .await?
            .ok_or_else(|| {
                CartError::Validation(format!(
                    "a cart line may hold at most {} units",
                    Quantity::MAX
                ))
            })?;

        debug!(line_id = %item.id, quantity = %item.quantity, "Cart line added");
        Ok(item)
    }

    /// Set the quantity of one of the principal's lines.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` for a bad quantity and
    /// `CartError::NotFound` when the line is missing or not the principal's.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn update_quantity(
        &self,
        principal: &Principal,
        line: CartLineId,
        quantity: i64,
    ) -> Result<CartItem, CartError> {
        let quantity = parse_quantity(quantity)?;
        self.store
            .set_quantity(principal.id, line, quantity)
            .await?
            .ok_or(CartError::NotFound("cart item"))
    }

    /// Remove one of the principal's lines.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` when the line is missing or not the
    /// principal's.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn remove_item(
        &self,
        principal: &Principal,
        line: CartLineId,
    ) -> Result<(), CartError> {
        if self.store.remove_line(principal.id, line).await? {
            Ok(())
        } else {
            Err(CartError::NotFound("cart item"))
        }
    }

    /// Remove every line in the principal's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn clear(&self, principal: &Principal) -> Result<u64, CartError> {
        Ok(self.store.clear(principal.id).await?)
    }
}

fn parse_quantity(value: i64) -> Result<Quantity, CartError> {
    Quantity::new(value).map_err(|e| CartError::Validation(e.to_string()))
}

//! In-memory store for tests and local demos.
//!
//! All state sits behind one async mutex, taken briefly per operation. A
//! checkout transaction additionally holds an owned guard on a separate
//! checkout mutex for its whole lifetime, so concurrent checkouts run one
//! after the other while cart edits keep going. Checkout writes are buffered
//! and only reach the state on commit; a dropped transaction leaves no trace.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use edubook_core::{
    CartLineId, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, Quantity, Role,
    UserId,
};

use super::{
    CartStore, CatalogStore, CheckoutStore, CheckoutTx, OrderStore, RepositoryError, Store,
};
use crate::models::{
    CartItem, CartLine, NewOrder, NewOrderItem, Order, OrderDetail, OrderItem, Product,
    StatusChange, StoreStats,
};

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<UserId, Role>,
    products: BTreeMap<ProductId, Product>,
    cart: BTreeMap<CartLineId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    items: BTreeMap<OrderItemId, OrderItem>,
    last_id: i64,
}

impl State {
    const fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        self.cart
            .values()
            .filter(|item| item.user_id == user)
            .map(|item| {
                let product = self.products.get(&item.product_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "cart line {} references missing product {}",
                        item.id, item.product_id
                    ))
                })?;
                Ok(CartLine {
                    id: item.id,
                    product: product.clone(),
                    quantity: item.quantity,
                    observed_price: item.observed_price,
                })
            })
            .collect()
    }

    fn clear_cart(&mut self, user: UserId) -> u64 {
        let before = self.cart.len();
        self.cart.retain(|_, item| item.user_id != user);
        u64::try_from(before - self.cart.len()).unwrap_or(u64::MAX)
    }

    fn detail(&self, order: &Order) -> OrderDetail {
        OrderDetail {
            order: order.clone(),
            items: self
                .items
                .values()
                .filter(|item| item.order_id == order.id)
                .cloned()
                .collect(),
        }
    }
}

/// Store backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    checkout: Arc<Mutex<()>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and return its id.
    pub async fn insert_user(&self, role: Role) -> UserId {
        let mut state = self.state.lock().await;
        let id = UserId::new(state.next_id());
        state.users.insert(id, role);
        id
    }

    /// Add an active catalog product with plenty of stock.
    pub async fn insert_product(&self, name: &str, price: Decimal) -> Product {
        let mut state = self.state.lock().await;
        let product = Product {
            id: ProductId::new(state.next_id()),
            name: name.to_string(),
            price,
            thumbnail: Some(format!("/images/{}.jpg", name.to_lowercase().replace(' ', "-"))),
            stock: 100,
            is_active: true,
        };
        state.products.insert(product.id, product.clone());
        product
    }

    /// Change a product's catalog price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown product.
    pub async fn set_product_price(
        &self,
        id: ProductId,
        price: Decimal,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let product = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        product.price = price;
        Ok(())
    }

    /// Hide or show a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown product.
    pub async fn set_product_active(
        &self,
        id: ProductId,
        is_active: bool,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let product = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        product.is_active = is_active;
        Ok(())
    }

    /// Delete a product the way the schema does: cart lines go with it,
    /// order items keep their frozen data but lose the reference.
    pub async fn delete_product(&self, id: ProductId) {
        let mut state = self.state.lock().await;
        state.products.remove(&id);
        state.cart.retain(|_, item| item.product_id != id);
        for item in state.items.values_mut() {
            if item.product_id == Some(id) {
                item.product_id = None;
            }
        }
    }

    /// Number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Number of stored order items across all orders.
    pub async fn order_item_count(&self) -> usize {
        self.state.lock().await.items.len()
    }
}

impl CatalogStore for MemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }
}

impl CartStore for MemoryStore {
    async fn principal_exists(&self, user: UserId) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.users.contains_key(&user))
    }

    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        self.state.lock().await.cart_lines(user)
    }

    async fn add_quantity(
        &self,
        user: UserId,
        product: &Product,
        quantity: Quantity,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        if let Some(item) = state
            .cart
            .values_mut()
            .find(|item| item.user_id == user && item.product_id == product.id)
        {
            let Ok(merged) = item.quantity.checked_add(quantity) else {
                return Ok(None);
            };
            item.quantity = merged;
            item.observed_price = product.price;
            item.updated_at = now;
            return Ok(Some(item.clone()));
        }

        let item = CartItem {
            id: CartLineId::new(state.next_id()),
            user_id: user,
            product_id: product.id,
            quantity,
            observed_price: product.price,
            created_at: now,
            updated_at: now,
        };
        state.cart.insert(item.id, item.clone());
        Ok(Some(item))
    }

    async fn set_quantity(
        &self,
        user: UserId,
        line: CartLineId,
        quantity: Quantity,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(item) = state
            .cart
            .get_mut(&line)
            .filter(|item| item.user_id == user)
        else {
            return Ok(None);
        };
        item.quantity = quantity;
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn remove_line(&self, user: UserId, line: CartLineId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.cart.get(&line).is_some_and(|item| item.user_id == user) {
            state.cart.remove(&line);
            return Ok(true);
        }
        Ok(false)
    }

    async fn clear(&self, user: UserId) -> Result<u64, RepositoryError> {
        Ok(self.state.lock().await.clear_cart(user))
    }
}

impl OrderStore for MemoryStore {
    async fn list_orders(
        &self,
        owner: Option<UserId>,
    ) -> Result<Vec<OrderDetail>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|order| owner.is_none_or(|user| order.user_id == user))
            .map(|order| state.detail(order))
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&id).map(|order| state.detail(order)))
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        change: &StatusChange,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(order) = state
            .orders
            .get_mut(&id)
            .filter(|order| order.status == from)
        else {
            return Ok(None);
        };
        change.apply(order);
        Ok(Some(order.clone()))
    }

    async fn stats(&self) -> Result<StoreStats, RepositoryError> {
        let state = self.state.lock().await;
        let mut counted: Vec<(OrderStatus, i64)> = Vec::new();
        for order in state.orders.values() {
            match counted.iter_mut().find(|(status, _)| *status == order.status) {
                Some((_, count)) => *count += 1,
                None => counted.push((order.status, 1)),
            }
        }
        let len = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        Ok(StoreStats::new(
            len(state.users.len()),
            len(state.products.len()),
            len(state.orders.len()),
            &counted,
        ))
    }
}

/// A checkout running against [`MemoryStore`].
///
/// Writes are buffered here and applied under the state lock on commit.
/// Dropping the transaction throws the buffer away.
pub struct MemoryCheckoutTx {
    state: Arc<Mutex<State>>,
    _serial: OwnedMutexGuard<()>,
    loaded: HashMap<CartLineId, Quantity>,
    orders: BTreeMap<OrderId, Order>,
    items: Vec<OrderItem>,
    cleared: Vec<(UserId, CartLineId)>,
}

impl CheckoutStore for MemoryStore {
    type Tx = MemoryCheckoutTx;

    async fn begin(&self) -> Result<MemoryCheckoutTx, RepositoryError> {
        let serial = Arc::clone(&self.checkout).lock_owned().await;
        Ok(MemoryCheckoutTx {
            state: Arc::clone(&self.state),
            _serial: serial,
            loaded: HashMap::new(),
            orders: BTreeMap::new(),
            items: Vec::new(),
            cleared: Vec::new(),
        })
    }
}

impl CheckoutTx for MemoryCheckoutTx {
    async fn load_cart(&mut self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = self.state.lock().await.cart_lines(user)?;
        self.loaded
            .extend(lines.iter().map(|line| (line.id, line.quantity)));
        Ok(lines)
    }

    async fn save_order(&mut self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let id = {
            let mut state = self.state.lock().await;
            if state
                .orders
                .values()
                .chain(self.orders.values())
                .any(|order| order.order_number == new.order_number)
            {
                return Err(RepositoryError::Conflict(
                    "order number already exists".to_string(),
                ));
            }
            OrderId::new(state.next_id())
        };

        let now = Utc::now();
        let order = Order {
            id,
            order_number: new.order_number.clone(),
            user_id: new.user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: new.payment_method,
            totals: new.totals,
            shipping: new.shipping.clone(),
            payment_intent_id: None,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn save_order_items(
        &mut self,
        order: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        if !self.orders.contains_key(&order) {
            return Err(RepositoryError::NotFound);
        }
        let mut state = self.state.lock().await;
        let saved: Vec<OrderItem> = items
            .iter()
            .map(|item| OrderItem {
                id: OrderItemId::new(state.next_id()),
                order_id: order,
                product_id: Some(item.product_id),
                product_name: item.product_name.clone(),
                product_thumbnail: item.product_thumbnail.clone(),
                price: item.price,
                quantity: item.quantity,
            })
            .collect();
        drop(state);
        self.items.extend(saved.iter().cloned());
        Ok(saved)
    }

    async fn attach_authorization(
        &mut self,
        order: OrderId,
        reference: &str,
    ) -> Result<Order, RepositoryError> {
        let stored = self
            .orders
            .get_mut(&order)
            .ok_or(RepositoryError::NotFound)?;
        if stored.payment_intent_id.is_some() || stored.payment_status != PaymentStatus::Unpaid {
            return Err(RepositoryError::Conflict(format!(
                "order {order} already has a payment authorization"
            )));
        }
        stored.payment_intent_id = Some(reference.to_string());
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn clear_cart(
        &mut self,
        user: UserId,
        lines: &[CartLineId],
    ) -> Result<u64, RepositoryError> {
        let owned = {
            let state = self.state.lock().await;
            lines
                .iter()
                .filter(|line| {
                    state
                        .cart
                        .get(*line)
                        .is_some_and(|item| item.user_id == user)
                })
                .count()
        };
        self.cleared.extend(lines.iter().map(|line| (user, *line)));
        Ok(u64::try_from(owned).unwrap_or(u64::MAX))
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        let Self {
            state,
            loaded,
            orders,
            items,
            cleared,
            ..
        } = self;
        let mut state = state.lock().await;
        state.orders.extend(orders);
        state.items.extend(items.into_iter().map(|item| (item.id, item)));

        // A line merged into after it was loaded keeps the unordered part.
        let now = Utc::now();
        for (user, line) in cleared {
            let remaining = match state.cart.get(&line) {
                Some(item) if item.user_id == user => {
                    let ordered = loaded.get(&line).map_or(0, |quantity| quantity.get());
                    item.quantity.get().saturating_sub(ordered)
                }
                _ => continue,
            };
            match Quantity::new(i64::from(remaining)) {
                Ok(rest) => {
                    if let Some(item) = state.cart.get_mut(&line) {
                        item.quantity = rest;
                        item.updated_at = now;
                    }
                }
                Err(_) => {
                    state.cart.remove(&line);
                }
            }
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_add_merges_and_respects_cap() {
        let store = MemoryStore::new();
        let user = store.insert_user(Role::User).await;
        let book = store.insert_product("Grammar", Decimal::new(80_000, 0)).await;

        store.add_quantity(user, &book, qty(500)).await.unwrap();
        let merged = store.add_quantity(user, &book, qty(499)).await.unwrap();
        assert_eq!(merged.unwrap().quantity.get(), 999);

        assert!(store.add_quantity(user, &book, qty(1)).await.unwrap().is_none());
        assert_eq!(store.cart_lines(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lines_are_scoped_to_owner() {
        let store = MemoryStore::new();
        let alice = store.insert_user(Role::User).await;
        let bob = store.insert_user(Role::User).await;
        let book = store.insert_product("Atlas", Decimal::new(120_000, 0)).await;

        let line = store
            .add_quantity(alice, &book, qty(1))
            .await
            .unwrap()
            .unwrap();

        assert!(store.set_quantity(bob, line.id, qty(3)).await.unwrap().is_none());
        assert!(!store.remove_line(bob, line.id).await.unwrap());
        assert_eq!(store.clear(bob).await.unwrap(), 0);
        assert_eq!(store.cart_lines(alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        let user = store.insert_user(Role::User).await;
        let book = store.insert_product("Atlas", Decimal::new(120_000, 0)).await;
        store.add_quantity(user, &book, qty(2)).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            let ids: Vec<_> = tx
                .load_cart(user)
                .await
                .unwrap()
                .iter()
                .map(|line| line.id)
                .collect();
            assert_eq!(tx.clear_cart(user, &ids).await.unwrap(), 1);
        }

        assert_eq!(store.cart_lines(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_keeps_lines_added_during_checkout() {
        let store = MemoryStore::new();
        let user = store.insert_user(Role::User).await;
        let ordered = store.insert_product("Atlas", Decimal::new(120_000, 0)).await;
        let late = store.insert_product("Lexicon", Decimal::new(90_000, 0)).await;
        store.add_quantity(user, &ordered, qty(2)).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let ids: Vec<_> = tx
            .load_cart(user)
            .await
            .unwrap()
            .iter()
            .map(|line| line.id)
            .collect();

        store.add_quantity(user, &late, qty(1)).await.unwrap();
        store.add_quantity(user, &ordered, qty(3)).await.unwrap();

        assert_eq!(tx.clear_cart(user, &ids).await.unwrap(), 1);
        tx.commit().await.unwrap();

        let mut left: Vec<_> = store
            .cart_lines(user)
            .await
            .unwrap()
            .into_iter()
            .map(|line| (line.product.name, line.quantity.get()))
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![("Atlas".to_string(), 3), ("Lexicon".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_clear_cart_ignores_other_users_lines() {
        let store = MemoryStore::new();
        let alice = store.insert_user(Role::User).await;
        let bob = store.insert_user(Role::User).await;
        let book = store.insert_product("Atlas", Decimal::new(120_000, 0)).await;
        let theirs = store
            .add_quantity(bob, &book, qty(1))
            .await
            .unwrap()
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.clear_cart(alice, &[theirs.id]).await.unwrap(), 0);
        tx.commit().await.unwrap();

        assert_eq!(store.cart_lines(bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = MemoryStore::new();
        let user = store.insert_user(Role::User).await;
        let book = store.insert_product("Atlas", Decimal::new(10_000, 0)).await;
        store.add_quantity(user, &book, qty(1)).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let lines = tx.load_cart(user).await.unwrap();
        let order = tx
            .save_order(&NewOrder {
                order_number: edubook_core::OrderNumber::generate(),
                user_id: user,
                payment_method: edubook_core::PaymentMethod::Stripe,
                totals: edubook_core::OrderTotals::new(
                    lines[0].line_total(),
                    Decimal::ZERO,
                    Decimal::ZERO,
                )
                .unwrap(),
                shipping: crate::models::ShippingForm {
                    name: "A".into(),
                    phone: "0900000000".into(),
                    address: "1 Street".into(),
                    ..Default::default()
                }
                .validate()
                .unwrap(),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let change = StatusChange::new(OrderStatus::Confirmed, Utc::now(), None);
        let first = store
            .transition_status(order.id, OrderStatus::Pending, &change)
            .await
            .unwrap();
        assert_eq!(first.unwrap().status, OrderStatus::Confirmed);

        let second = store
            .transition_status(order.id, OrderStatus::Pending, &change)
            .await
            .unwrap();
        assert!(second.is_none());
    }
}

//! Order service keeping orders and their items consistent.

use common::{Money, OrderId, TableNumber, UserId};
use store::{
    NewOrder, NewOrderItem, Order, OrderItem, PENDING_ORDER_CONSTRAINT, Store, StoreError,
    StoreTransaction,
};

use crate::error::{DomainError, Result};
use crate::transaction::finish;

use super::{AddItem, RemoveItem, UpdateOrderStatus};

/// How many times `add_item` runs its unit of work when it loses a race to
/// open the pending order of a table.
const MAX_ADD_ATTEMPTS: u32 = 3;

/// Service for managing orders and order items.
///
/// Every mutation runs in a single transaction that re-derives the order
/// total from the stored items before committing, so an order's
/// `total_amount` always equals the sum of its items.
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds a product to the pending order of a table, opening the order
    /// if the table has none.
    ///
    /// Returns the created item with its product populated.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, cmd: AddItem) -> Result<OrderItem> {
        cmd.validate()?;

        let product = self
            .store
            .get_product(cmd.product_id)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound(cmd.product_id.to_string()))?;
        let total_price = product
            .price
            .checked_multiply(cmd.quantity)
            .ok_or_else(|| {
                DomainError::Validation(format!(
                    "total price of {} x {} is out of range",
                    cmd.quantity, product.price
                ))
            })?;

        let mut attempt = 1;
        let (item, opened) = loop {
            let mut tx = self.store.begin().await?;
            let result = attach_item(&mut tx, &cmd, total_price).await;
            match finish(tx, result).await {
                Err(DomainError::Store(err))
                    if err.is_unique_violation_of(PENDING_ORDER_CONSTRAINT)
                        && attempt < MAX_ADD_ATTEMPTS =>
                {
                    tracing::warn!(
                        attempt,
                        table_number = %cmd.table_number,
                        "Lost race to open pending order, retrying"
                    );
                    attempt += 1;
                }
                other => break other?,
            }
        };

        if opened {
            metrics::counter!("orders_opened_total").increment(1);
        }
        metrics::counter!("order_items_added_total").increment(1);
        tracing::info!(
            order_item_id = %item.id,
            order_id = ?item.order_id,
            total_price = %item.total_price,
            "Order item added"
        );
        Ok(item)
    }

    /// Removes an item from its order and returns it, detached.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, cmd: RemoveItem) -> Result<OrderItem> {
        let mut tx = self.store.begin().await?;
        let result = detach_item(&mut tx, cmd).await;
        let (item, total) = finish(tx, result).await?;

        metrics::counter!("order_items_removed_total").increment(1);
        tracing::info!(order_item_id = %item.id, order_total = %total, "Order item removed");
        Ok(item)
    }

    /// Moves an order to a new status if the transition is allowed.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, cmd: UpdateOrderStatus) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let result = change_status(&mut tx, cmd).await;
        let order = finish(tx, result).await?;

        tracing::info!(order_id = %order.id, status = %order.status, "Order status updated");
        Ok(order)
    }

    /// Lists every order with its items.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.list_orders().await?)
    }

    /// Lists every order item with its product.
    #[tracing::instrument(skip(self))]
    pub async fn list_items(&self) -> Result<Vec<OrderItem>> {
        Ok(self.store.list_order_items().await?)
    }

    /// Lists the order items placed by a user.
    #[tracing::instrument(skip(self))]
    pub async fn list_items_by_user(&self, user_id: UserId) -> Result<Vec<OrderItem>> {
        Ok(self.store.list_order_items_by_user(user_id).await?)
    }

    /// Loads an order by id.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.store.get_order(id).await?)
    }

    /// Loads the pending order of a table, if the table is occupied.
    #[tracing::instrument(skip(self))]
    pub async fn pending_order_for_table(&self, table_number: TableNumber) -> Result<Option<Order>> {
        Ok(self.store.find_pending_order(table_number).await?)
    }
}

/// Attaches a new item to the table's pending order, opening one if needed.
///
/// Returns the inserted item, product populated, and whether a new order
/// was opened.
async fn attach_item<Tx: StoreTransaction>(
    tx: &mut Tx,
    cmd: &AddItem,
    total_price: Money,
) -> Result<(OrderItem, bool)> {
    let (order, opened) = match tx.lock_pending_order(cmd.table_number).await? {
        Some(order) if !order.status.accepts_items() => {
            return Err(DomainError::OrderClosed {
                id: order.id,
                status: order.status,
            });
        }
        Some(order) => (order, false),
        None => {
            let order = tx
                .insert_order(NewOrder::pending(cmd.table_number, cmd.user_id))
                .await?;
            (order, true)
        }
    };

    let item = tx
        .insert_order_item(NewOrderItem {
            user_id: cmd.user_id,
            order_id: order.id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            total_price,
            table_number: cmd.table_number,
        })
        .await
        .map_err(|err| match err {
            // The product was deleted after it was resolved.
            StoreError::ForeignKeyViolation { .. } => {
                DomainError::ProductNotFound(cmd.product_id.to_string())
            }
            other => other.into(),
        })?;

    recompute_total(tx, order.id).await?;

    let item = tx
        .get_order_item(item.id)
        .await?
        .ok_or(DomainError::OrderItemNotFound(item.id))?;
    Ok((item, opened))
}

/// Deletes an item and returns it with the new total of its former order.
async fn detach_item<Tx: StoreTransaction>(
    tx: &mut Tx,
    cmd: RemoveItem,
) -> Result<(OrderItem, Money)> {
    let id = cmd.order_item_id;
    let item = tx
        .get_order_item(id)
        .await?
        .ok_or(DomainError::OrderItemNotFound(id))?;
    let order_id = item.order_id.ok_or(DomainError::ItemNotAttached(id))?;

    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or(DomainError::OrderNotFound(order_id))?;
    if order.status.is_terminal() {
        return Err(DomainError::OrderClosed {
            id: order.id,
            status: order.status,
        });
    }

    tx.delete_order_item(id).await?;
    let total = recompute_total(tx, order.id).await?;

    Ok((
        OrderItem {
            order_id: None,
            ..item
        },
        total,
    ))
}

async fn change_status<Tx: StoreTransaction>(
    tx: &mut Tx,
    cmd: UpdateOrderStatus,
) -> Result<Order> {
    let mut order = tx
        .lock_order(cmd.order_id)
        .await?
        .ok_or(DomainError::OrderNotFound(cmd.order_id))?;

    if !order.status.can_transition_to(cmd.new_status) {
        return Err(DomainError::InvalidStatusTransition {
            from: order.status,
            to: cmd.new_status,
        });
    }

    tx.set_order_status(order.id, cmd.new_status).await?;
    order.status = cmd.new_status;
    Ok(order)
}

/// Re-derives an order's total from its stored items and persists it.
async fn recompute_total<Tx: StoreTransaction>(tx: &mut Tx, order_id: OrderId) -> Result<Money> {
    let total = tx
        .sum_item_totals(order_id)
        .await
        .map_err(|err| match err {
            StoreError::TotalOutOfRange { order_id: id } => {
                DomainError::Validation(format!("total of order {id} is out of range"))
            }
            other => other.into(),
        })?;
    tx.set_order_total(order_id, total).await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use common::{OrderItemId, OrderStatus, ProductId};
    use store::{InMemoryStore, InMemoryTransaction, NewProduct, Product};

    /// In-memory store that can inject faults into the order write path.
    #[derive(Clone, Default)]
    struct FaultyStore {
        inner: InMemoryStore,
        /// `insert_order` calls left that report a lost pending-order race.
        collisions: Arc<AtomicU32>,
        /// Committed order items are invisible to store-level reads.
        hide_committed_items: bool,
        /// Status reported for a table's pending order.
        pending_status: Option<OrderStatus>,
    }

    impl FaultyStore {
        fn with_collisions(inner: InMemoryStore, collisions: u32) -> Self {
            Self {
                inner,
                collisions: Arc::new(AtomicU32::new(collisions)),
                ..Self::default()
            }
        }

        fn collisions_left(&self) -> u32 {
            self.collisions.load(Ordering::SeqCst)
        }
    }

    struct FaultyTransaction {
        inner: InMemoryTransaction,
        collisions: Arc<AtomicU32>,
        pending_status: Option<OrderStatus>,
    }

    #[async_trait]
    impl Store for FaultyStore {
        type Tx = FaultyTransaction;

        async fn begin(&self) -> store::Result<FaultyTransaction> {
            Ok(FaultyTransaction {
                inner: self.inner.begin().await?,
                collisions: self.collisions.clone(),
                pending_status: self.pending_status,
            })
        }

        async fn get_product(&self, id: ProductId) -> store::Result<Option<Product>> {
            self.inner.get_product(id).await
        }

        async fn find_product_by_name(&self, name: &str) -> store::Result<Option<Product>> {
            self.inner.find_product_by_name(name).await
        }

        async fn get_order(&self, id: OrderId) -> store::Result<Option<Order>> {
            self.inner.get_order(id).await
        }

        async fn find_pending_order(
            &self,
            table_number: TableNumber,
        ) -> store::Result<Option<Order>> {
            self.inner.find_pending_order(table_number).await
        }

        async fn list_orders(&self) -> store::Result<Vec<Order>> {
            self.inner.list_orders().await
        }

        async fn get_order_item(&self, id: OrderItemId) -> store::Result<Option<OrderItem>> {
            if self.hide_committed_items {
                return Ok(None);
            }
            self.inner.get_order_item(id).await
        }

        async fn list_order_items(&self) -> store::Result<Vec<OrderItem>> {
            self.inner.list_order_items().await
        }

        async fn list_order_items_by_user(
            &self,
            user_id: UserId,
        ) -> store::Result<Vec<OrderItem>> {
            self.inner.list_order_items_by_user(user_id).await
        }
    }

    #[async_trait]
    impl StoreTransaction for FaultyTransaction {
        async fn find_product_by_name(&mut self, name: &str) -> store::Result<Option<Product>> {
            self.inner.find_product_by_name(name).await
        }

        async fn insert_product(&mut self, product: NewProduct) -> store::Result<Product> {
            self.inner.insert_product(product).await
        }

        async fn update_product(&mut self, product: &Product) -> store::Result<()> {
            self.inner.update_product(product).await
        }

        async fn delete_product(&mut self, id: ProductId) -> store::Result<()> {
            self.inner.delete_product(id).await
        }

        async fn product_in_use(&mut self, id: ProductId) -> store::Result<bool> {
            self.inner.product_in_use(id).await
        }

        async fn lock_pending_order(
            &mut self,
            table_number: TableNumber,
        ) -> store::Result<Option<Order>> {
            let order = self.inner.lock_pending_order(table_number).await?;
            Ok(order.map(|order| match self.pending_status {
                Some(status) => Order { status, ..order },
                None => order,
            }))
        }

        async fn lock_order(&mut self, id: OrderId) -> store::Result<Option<Order>> {
            self.inner.lock_order(id).await
        }

        async fn insert_order(&mut self, order: NewOrder) -> store::Result<Order> {
            let collided = self
                .collisions
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if collided {
                return Err(StoreError::UniqueViolation {
                    constraint: PENDING_ORDER_CONSTRAINT.to_string(),
                });
            }
            self.inner.insert_order(order).await
        }

        async fn set_order_total(&mut self, id: OrderId, total: Money) -> store::Result<()> {
            self.inner.set_order_total(id, total).await
        }

        async fn set_order_status(
            &mut self,
            id: OrderId,
            status: OrderStatus,
        ) -> store::Result<()> {
            self.inner.set_order_status(id, status).await
        }

        async fn get_order_item(&mut self, id: OrderItemId) -> store::Result<Option<OrderItem>> {
            self.inner.get_order_item(id).await
        }

        async fn insert_order_item(&mut self, item: NewOrderItem) -> store::Result<OrderItem> {
            self.inner.insert_order_item(item).await
        }

        async fn delete_order_item(&mut self, id: OrderItemId) -> store::Result<()> {
            self.inner.delete_order_item(id).await
        }

        async fn sum_item_totals(&mut self, order_id: OrderId) -> store::Result<Money> {
            self.inner.sum_item_totals(order_id).await
        }

        async fn commit(self) -> store::Result<()> {
            self.inner.commit().await
        }

        async fn rollback(self) -> store::Result<()> {
            self.inner.rollback().await
        }
    }

    async fn seed(store: &InMemoryStore, name: &str, price: i64) -> Product {
        let mut tx = store.begin().await.unwrap();
        let product = tx
            .insert_product(NewProduct {
                name: name.to_string(),
                description: String::new(),
                price: Money::from_cents(price),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        product
    }

    fn add(product: &Product, quantity: i32, table: i32) -> AddItem {
        AddItem::new(UserId::new(1), product.id, quantity, TableNumber::new(table))
    }

    #[tokio::test]
    async fn test_add_item_opens_order() {
        let store = InMemoryStore::new();
        let burger = seed(&store, "Burger", 500).await;
        let service = OrderService::new(store);

        let item = service.add_item(add(&burger, 3, 2)).await.unwrap();

        assert_eq!(item.total_price, Money::from_cents(1500));
        assert_eq!(item.product.as_ref(), Some(&burger));
        let order_id = item.order_id.unwrap();
        let order = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.table_number, TableNumber::new(2));
        assert_eq!(order.total_amount, Money::from_cents(1500));
    }

    #[tokio::test]
    async fn test_add_item_unknown_product() {
        let service = OrderService::new(InMemoryStore::new());

        let cmd = AddItem::new(UserId::new(1), ProductId::new(9), 1, TableNumber::new(1));
        let result = service.add_item(cmd).await;

        assert!(matches!(result, Err(DomainError::ProductNotFound(_))));
        assert_eq!(service.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_item_overflow_is_rejected() {
        let store = InMemoryStore::new();
        let pricey = seed(&store, "Caviar", i64::MAX / 2).await;
        let service = OrderService::new(store);

        let result = service.add_item(add(&pricey, 3, 1)).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(service.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_item_order_total_overflow_is_rejected() {
        let store = InMemoryStore::new();
        let pricey = seed(&store, "Caviar", i64::MAX / 2 + 1).await;
        let service = OrderService::new(store);
        let first = service.add_item(add(&pricey, 1, 1)).await.unwrap();

        let result = service.add_item(add(&pricey, 1, 1)).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        let order = service
            .get_order(first.order_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.total_amount, pricey.price);
        assert_eq!(service.store().order_item_count().await, 1);
    }

    #[tokio::test]
    async fn test_add_item_retries_after_losing_pending_order_race() {
        let inner = InMemoryStore::new();
        let burger = seed(&inner, "Burger", 500).await;
        let store = FaultyStore::with_collisions(inner.clone(), 1);
        let service = OrderService::new(store.clone());

        let item = service.add_item(add(&burger, 2, 3)).await.unwrap();

        assert_eq!(store.collisions_left(), 0);
        assert_eq!(inner.order_count().await, 1);
        let order = inner
            .find_pending_order(TableNumber::new(3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.order_id, Some(order.id));
        assert_eq!(order.total_amount, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_add_item_gives_up_after_repeated_races() {
        let inner = InMemoryStore::new();
        let burger = seed(&inner, "Burger", 500).await;
        let store = FaultyStore::with_collisions(inner.clone(), MAX_ADD_ATTEMPTS + 1);
        let service = OrderService::new(store.clone());

        let err = service.add_item(add(&burger, 1, 3)).await.unwrap_err();

        assert!(matches!(
            &err,
            DomainError::Store(e) if e.is_unique_violation_of(PENDING_ORDER_CONSTRAINT)
        ));
        assert_eq!(store.collisions_left(), 1);
        assert_eq!(inner.order_count().await, 0);
        assert_eq!(inner.order_item_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_item_returns_item_read_before_commit() {
        let inner = InMemoryStore::new();
        let burger = seed(&inner, "Burger", 500).await;
        let store = FaultyStore {
            inner: inner.clone(),
            hide_committed_items: true,
            ..FaultyStore::default()
        };
        let service = OrderService::new(store);

        let item = service.add_item(add(&burger, 2, 1)).await.unwrap();

        assert_eq!(item.product.as_ref(), Some(&burger));
        assert_eq!(item.total_price, Money::from_cents(1000));
        assert_eq!(inner.order_item_count().await, 1);
    }

    #[tokio::test]
    async fn test_add_item_refuses_order_not_accepting_items() {
        let inner = InMemoryStore::new();
        let burger = seed(&inner, "Burger", 500).await;
        OrderService::new(inner.clone())
            .add_item(add(&burger, 1, 8))
            .await
            .unwrap();
        let store = FaultyStore {
            inner: inner.clone(),
            pending_status: Some(OrderStatus::Served),
            ..FaultyStore::default()
        };
        let service = OrderService::new(store);

        let result = service.add_item(add(&burger, 1, 8)).await;

        assert!(matches!(
            result,
            Err(DomainError::OrderClosed {
                status: OrderStatus::Served,
                ..
            })
        ));
        assert_eq!(inner.order_item_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_item_returns_detached_item() {
        let store = InMemoryStore::new();
        let burger = seed(&store, "Burger", 500).await;
        let service = OrderService::new(store);
        let item = service.add_item(add(&burger, 1, 1)).await.unwrap();

        let removed = service.remove_item(RemoveItem::new(item.id)).await.unwrap();

        assert_eq!(removed.id, item.id);
        assert_eq!(removed.order_id, None);
        assert_eq!(removed.product, item.product);
    }

    #[tokio::test]
    async fn test_remove_missing_item() {
        let service = OrderService::new(InMemoryStore::new());

        let result = service
            .remove_item(RemoveItem::new(OrderItemId::new(5)))
            .await;
        assert!(matches!(result, Err(DomainError::OrderItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_emptied_order_stays_pending() {
        let store = InMemoryStore::new();
        let burger = seed(&store, "Burger", 500).await;
        let service = OrderService::new(store);
        let item = service.add_item(add(&burger, 2, 6)).await.unwrap();

        service.remove_item(RemoveItem::new(item.id)).await.unwrap();

        let order = service
            .pending_order_for_table(TableNumber::new(6))
            .await
            .unwrap()
            .unwrap();
        assert!(order.items.is_empty());
        assert_eq!(order.total_amount, Money::zero());
    }

    #[tokio::test]
    async fn test_closed_order_items_cannot_be_removed() {
        let store = InMemoryStore::new();
        let burger = seed(&store, "Burger", 500).await;
        let service = OrderService::new(store);
        let item = service.add_item(add(&burger, 1, 1)).await.unwrap();
        let order_id = item.order_id.unwrap();
        service
            .update_status(UpdateOrderStatus::new(order_id, OrderStatus::Closed))
            .await
            .unwrap();

        let result = service.remove_item(RemoveItem::new(item.id)).await;

        assert!(matches!(result, Err(DomainError::OrderClosed { .. })));
        let order = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.total_amount, Money::from_cents(500));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let store = InMemoryStore::new();
        let burger = seed(&store, "Burger", 500).await;
        let service = OrderService::new(store);
        let order_id = service
            .add_item(add(&burger, 1, 1))
            .await
            .unwrap()
            .order_id
            .unwrap();

        let served = service
            .update_status(UpdateOrderStatus::new(order_id, OrderStatus::Served))
            .await
            .unwrap();
        assert_eq!(served.status, OrderStatus::Served);
        assert_eq!(served.items.len(), 1);

        let back = service
            .update_status(UpdateOrderStatus::new(order_id, OrderStatus::Pending))
            .await;
        assert!(matches!(
            back,
            Err(DomainError::InvalidStatusTransition {
                from: OrderStatus::Served,
                to: OrderStatus::Pending,
            })
        ));

        let stored = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Served);
    }

    #[tokio::test]
    async fn test_update_status_missing_order() {
        let service = OrderService::new(InMemoryStore::new());

        let result = service
            .update_status(UpdateOrderStatus::new(OrderId::new(3), OrderStatus::Closed))
            .await;
        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_served_table_gets_a_new_order() {
        let store = InMemoryStore::new();
        let burger = seed(&store, "Burger", 500).await;
        let service = OrderService::new(store);
        let first = service.add_item(add(&burger, 1, 4)).await.unwrap();
        service
            .update_status(UpdateOrderStatus::new(
                first.order_id.unwrap(),
                OrderStatus::Served,
            ))
            .await
            .unwrap();

        let second = service.add_item(add(&burger, 1, 4)).await.unwrap();

        assert_ne!(first.order_id, second.order_id);
        assert_eq!(service.list_orders().await.unwrap().len(), 2);
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, OrderId, OrderItemId, OrderStatus, ProductId, TableNumber, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{PENDING_ORDER_CONSTRAINT, PRODUCT_NAME_CONSTRAINT};
use crate::record::{NewOrder, NewOrderItem, NewProduct, Order, OrderItem, Product};
use crate::store::{Store, StoreTransaction};
use crate::{Result, StoreError};

const PRODUCT_FOREIGN_KEY: &str = "order_items_product_id_fkey";

#[derive(Debug, Clone, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    /// Order headers; `items` is always empty here.
    orders: BTreeMap<OrderId, Order>,
    /// Item rows; `product` is always `None` here.
    items: BTreeMap<OrderItemId, OrderItem>,
    last_product_id: i64,
    last_order_id: i64,
    last_item_id: i64,
}

impl Tables {
    fn product_named(&self, name: &str) -> Option<&Product> {
        self.products.values().find(|p| p.name == name)
    }

    fn hydrate_item(&self, item: &OrderItem) -> OrderItem {
        let mut item = item.clone();
        item.product = self.products.get(&item.product_id).cloned();
        item
    }

    fn hydrate_order(&self, header: &Order) -> Order {
        let mut order = header.clone();
        order.items = self
            .items
            .values()
            .filter(|item| item.order_id == Some(header.id))
            .map(|item| self.hydrate_item(item))
            .collect();
        order
    }

    fn pending_order(&self, table_number: TableNumber) -> Option<Order> {
        self.orders
            .values()
            .find(|o| o.table_number == table_number && o.status == OrderStatus::Pending)
            .map(|o| self.hydrate_order(o))
    }

    fn items_where(&self, keep: impl Fn(&OrderItem) -> bool) -> Vec<OrderItem> {
        self.items
            .values()
            .filter(|item| keep(*item))
            .map(|item| self.hydrate_item(item))
            .collect()
    }
}

/// In-memory store implementation for tests and local runs.
///
/// A transaction holds the store-wide lock from `begin` until it is
/// committed or dropped, so transactions are fully serialized. It works on
/// a private copy of the tables that is published on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// Returns the number of order items stored.
    pub async fn order_item_count(&self) -> usize {
        self.tables.lock().await.items.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.product_named(name).cloned())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.get(&id).map(|o| tables.hydrate_order(o)))
    }

    async fn find_pending_order(&self, table_number: TableNumber) -> Result<Option<Order>> {
        Ok(self.tables.lock().await.pending_order(table_number))
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .map(|o| tables.hydrate_order(o))
            .collect())
    }

    async fn get_order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>> {
        let tables = self.tables.lock().await;
        Ok(tables.items.get(&id).map(|item| tables.hydrate_item(item)))
    }

    async fn list_order_items(&self) -> Result<Vec<OrderItem>> {
        Ok(self.tables.lock().await.items_where(|_| true))
    }

    async fn list_order_items_by_user(&self, user_id: UserId) -> Result<Vec<OrderItem>> {
        Ok(self
            .tables
            .lock()
            .await
            .items_where(|item| item.user_id == user_id))
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_product_by_name(&mut self, name: &str) -> Result<Option<Product>> {
        Ok(self.working.product_named(name).cloned())
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        if self.working.product_named(&product.name).is_some() {
            return Err(StoreError::UniqueViolation {
                constraint: PRODUCT_NAME_CONSTRAINT.to_string(),
            });
        }

        self.working.last_product_id += 1;
        let product = Product {
            id: ProductId::new(self.working.last_product_id),
            name: product.name,
            description: product.description,
            price: product.price,
        };
        self.working.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(&mut self, product: &Product) -> Result<()> {
        if self
            .working
            .products
            .values()
            .any(|p| p.id != product.id && p.name == product.name)
        {
            return Err(StoreError::UniqueViolation {
                constraint: PRODUCT_NAME_CONSTRAINT.to_string(),
            });
        }

        let row = self
            .working
            .products
            .get_mut(&product.id)
            .ok_or(StoreError::NotFound {
                entity: "product",
                id: product.id.as_i64(),
            })?;
        *row = product.clone();
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<()> {
        if self.product_in_use(id).await? {
            return Err(StoreError::ForeignKeyViolation {
                constraint: PRODUCT_FOREIGN_KEY.to_string(),
            });
        }
        self.working.products.remove(&id);
        Ok(())
    }

    async fn product_in_use(&mut self, id: ProductId) -> Result<bool> {
        Ok(self.working.items.values().any(|item| item.product_id == id))
    }

    async fn lock_pending_order(&mut self, table_number: TableNumber) -> Result<Option<Order>> {
        // The whole store is already locked by this transaction.
        Ok(self.working.pending_order(table_number))
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .working
            .orders
            .get(&id)
            .map(|o| self.working.hydrate_order(o)))
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        if order.status == OrderStatus::Pending
            && self.working.pending_order(order.table_number).is_some()
        {
            return Err(StoreError::UniqueViolation {
                constraint: PENDING_ORDER_CONSTRAINT.to_string(),
            });
        }

        self.working.last_order_id += 1;
        let order = Order {
            id: OrderId::new(self.working.last_order_id),
            table_number: order.table_number,
            user_id: order.user_id,
            items: Vec::new(),
            order_date: order.order_date,
            total_amount: Money::zero(),
            status: order.status,
        };
        self.working.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn set_order_total(&mut self, id: OrderId, total: Money) -> Result<()> {
        let order = self.working.orders.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "order",
            id: id.as_i64(),
        })?;
        order.total_amount = total;
        Ok(())
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let table_number = self
            .working
            .orders
            .get(&id)
            .map(|o| o.table_number)
            .ok_or(StoreError::NotFound {
                entity: "order",
                id: id.as_i64(),
            })?;

        if status == OrderStatus::Pending
            && self
                .working
                .pending_order(table_number)
                .is_some_and(|pending| pending.id != id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: PENDING_ORDER_CONSTRAINT.to_string(),
            });
        }

        if let Some(order) = self.working.orders.get_mut(&id) {
            order.status = status;
        }
        Ok(())
    }

    async fn get_order_item(&mut self, id: OrderItemId) -> Result<Option<OrderItem>> {
        Ok(self
            .working
            .items
            .get(&id)
            .map(|item| self.working.hydrate_item(item)))
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        if !self.working.products.contains_key(&item.product_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: PRODUCT_FOREIGN_KEY.to_string(),
            });
        }

        self.working.last_item_id += 1;
        let item = OrderItem {
            id: OrderItemId::new(self.working.last_item_id),
            user_id: item.user_id,
            order_id: Some(item.order_id),
            product_id: item.product_id,
            product: None,
            quantity: item.quantity,
            total_price: item.total_price,
            table_number: item.table_number,
        };
        self.working.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn delete_order_item(&mut self, id: OrderItemId) -> Result<()> {
        self.working
            .items
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                entity: "order item",
                id: id.as_i64(),
            })
    }

    async fn sum_item_totals(&mut self, order_id: OrderId) -> Result<Money> {
        let totals = self
            .working
            .items
            .values()
            .filter(|item| item.order_id == Some(order_id))
            .map(|item| item.total_price);
        Money::checked_sum(totals).ok_or(StoreError::TotalOutOfRange {
            order_id: order_id.as_i64(),
        })
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

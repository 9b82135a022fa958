use async_trait::async_trait;
use common::{Money, OrderId, OrderItemId, OrderStatus, ProductId, TableNumber, UserId};

use crate::Result;
use crate::record::{NewOrder, NewOrderItem, NewProduct, Order, OrderItem, Product};

/// Core trait for store implementations.
///
/// A store is the single shared mutable resource of the service. It is
/// passed explicitly to every component that needs it, so implementations
/// are expected to be cheap to clone.
///
/// Reads on the store observe committed state only. Writes go through a
/// [`StoreTransaction`] obtained from [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction type handed out by [`Store::begin`].
    type Tx: StoreTransaction;

    /// Starts a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Retrieves a product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Retrieves a product by its unique name.
    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>>;

    /// Retrieves an order with all of its items.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Retrieves the pending order for a table, if any.
    async fn find_pending_order(&self, table_number: TableNumber) -> Result<Option<Order>>;

    /// Retrieves every order with its items, ordered by id.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Retrieves a single order item with its product.
    async fn get_order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>>;

    /// Retrieves every order item with its product, ordered by id.
    async fn list_order_items(&self) -> Result<Vec<OrderItem>>;

    /// Retrieves the order items placed by a user, ordered by id.
    async fn list_order_items_by_user(&self, user_id: UserId) -> Result<Vec<OrderItem>>;
}

/// A unit of work against the store.
///
/// Every write made through a transaction becomes visible only when
/// [`StoreTransaction::commit`] succeeds. Dropping a transaction without
/// committing it rolls it back, so an early return or a cancelled future
/// never leaves partial state behind.
#[async_trait]
pub trait StoreTransaction: Send + Sized {
    /// Retrieves a product by its unique name.
    async fn find_product_by_name(&mut self, name: &str) -> Result<Option<Product>>;

    /// Inserts a product and returns it with its assigned id.
    ///
    /// Fails with `UniqueViolation` if the name is taken.
    async fn insert_product(&mut self, product: NewProduct) -> Result<Product>;

    /// Overwrites the name, description and price of an existing product.
    async fn update_product(&mut self, product: &Product) -> Result<()>;

    /// Deletes a product.
    ///
    /// Fails with `ForeignKeyViolation` if order items still reference it.
    async fn delete_product(&mut self, id: ProductId) -> Result<()>;

    /// Returns true if any order item references the product.
    async fn product_in_use(&mut self, id: ProductId) -> Result<bool>;

    /// Serializes against every other transaction addressing the same table
    /// and returns the table's pending order, if any.
    ///
    /// The lock is held until the transaction ends.
    async fn lock_pending_order(&mut self, table_number: TableNumber) -> Result<Option<Order>>;

    /// Loads an order with its items and locks it until the transaction ends.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Inserts an order with a zero total and no items.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    /// Persists a new total amount for an order.
    async fn set_order_total(&mut self, id: OrderId, total: Money) -> Result<()>;

    /// Persists a new status for an order.
    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()>;

    /// Retrieves a single order item with its product.
    async fn get_order_item(&mut self, id: OrderItemId) -> Result<Option<OrderItem>>;

    /// Inserts an order item and returns it with its assigned id.
    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem>;

    /// Deletes an order item.
    async fn delete_order_item(&mut self, id: OrderItemId) -> Result<()>;

    /// Sums `total_price` over the items currently attached to an order.
    async fn sum_item_totals(&mut self, order_id: OrderId) -> Result<Money>;

    /// Makes every write of this transaction visible.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<()>;
}

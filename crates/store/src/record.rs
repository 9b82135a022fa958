//! Rows persisted by the store and the values used to insert them.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, OrderStatus, ProductId, TableNumber, UserId};
use serde::{Deserialize, Serialize};

/// A product on the restaurant menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Price per unit in minor currency units.
    pub price: Money,
}

/// Values for a product that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
}

/// One line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub user_id: UserId,
    /// `None` while the item is not attached to any order.
    pub order_id: Option<OrderId>,
    pub product_id: ProductId,
    /// Populated on every read path; `None` only on freshly inserted rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    pub quantity: i32,
    /// `quantity * price` as it was when the item was created.
    pub total_price: Money,
    pub table_number: TableNumber,
}

/// Values for an order item that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub user_id: UserId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub total_price: Money,
    pub table_number: TableNumber,
}

/// A table's bill together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub table_number: TableNumber,
    pub user_id: UserId,
    /// Ordered by item id.
    pub items: Vec<OrderItem>,
    pub order_date: DateTime<Utc>,
    pub total_amount: Money,
    pub status: OrderStatus,
}

impl Order {
    /// Sum of the item totals currently held in memory.
    ///
    /// Returns `None` if the sum overflows.
    pub fn items_total(&self) -> Option<Money> {
        Money::checked_sum(self.items.iter().map(|item| item.total_price))
    }
}

/// Values for an order that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub table_number: TableNumber,
    pub user_id: UserId,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
}

impl NewOrder {
    /// A fresh pending order for a table, dated now.
    pub fn pending(table_number: TableNumber, user_id: UserId) -> Self {
        Self {
            table_number,
            user_id,
            order_date: Utc::now(),
            status: OrderStatus::Pending,
        }
    }
}

//! Order commands.

use common::{OrderId, OrderItemId, OrderStatus, ProductId, TableNumber, UserId};

use crate::error::{DomainError, Result};

/// Command to add a product to the pending order of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub table_number: TableNumber,
}

impl AddItem {
    /// Creates a new AddItem command.
    pub fn new(
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
        table_number: TableNumber,
    ) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
            table_number,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.quantity <= 0 {
            return Err(DomainError::Validation(format!(
                "quantity must be greater than 0, got {}",
                self.quantity
            )));
        }
        if !self.table_number.is_valid() {
            return Err(DomainError::Validation(format!(
                "table number must be greater than 0, got {}",
                self.table_number
            )));
        }
        Ok(())
    }
}

/// Command to remove an item from its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveItem {
    pub order_item_id: OrderItemId,
}

impl RemoveItem {
    /// Creates a new RemoveItem command.
    pub fn new(order_item_id: OrderItemId) -> Self {
        Self { order_item_id }
    }
}

/// Command to move an order to a new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub new_status: OrderStatus,
}

impl UpdateOrderStatus {
    /// Creates a new UpdateOrderStatus command.
    pub fn new(order_id: OrderId, new_status: OrderStatus) -> Self {
        Self {
            order_id,
            new_status,
        }
    }
}

//! Recognised message patterns.

use std::str::FromStr;

use crate::error::DispatchError;

/// An inbound action verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GetProduct,
    CreateProduct,
    EditProduct,
    DeleteProduct,
    CreateOrderItem,
    GetAllOrderItems,
    GetOrderItemsByUser,
    GetAllOrders,
    UpdateOrderStatus,
    DeleteOrderItem,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::GetProduct,
        Action::CreateProduct,
        Action::EditProduct,
        Action::DeleteProduct,
        Action::CreateOrderItem,
        Action::GetAllOrderItems,
        Action::GetOrderItemsByUser,
        Action::GetAllOrders,
        Action::UpdateOrderStatus,
        Action::DeleteOrderItem,
    ];

    /// The pattern name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetProduct => "GET_PRODUCT",
            Action::CreateProduct => "CREATE_PRODUCT",
            Action::EditProduct => "EDIT_PRODUCT",
            Action::DeleteProduct => "DELETE_PRODUCT",
            Action::CreateOrderItem => "CREATE_ORDER_ITEM",
            Action::GetAllOrderItems => "GET_ALL_ORDER_ITEMS",
            Action::GetOrderItemsByUser => "GET_ORDER_ITEMSBYUSER",
            Action::GetAllOrders => "GET_ALL_ORDERS",
            Action::UpdateOrderStatus => "UPDATE_ORDER_STATUS_BY_TABLE",
            Action::DeleteOrderItem => "DELETE_ORDER_ITEM",
        }
    }

    /// Reply message when the action succeeds.
    pub fn success_message(&self) -> &'static str {
        match self {
            Action::GetProduct => "Product retrieved",
            Action::CreateProduct => "Product created",
            Action::EditProduct => "Product updated",
            Action::DeleteProduct => "Product deleted",
            Action::CreateOrderItem => "Order item created",
            Action::GetAllOrderItems => "Order items fetched",
            Action::GetOrderItemsByUser => "Order Items retrieved successfully",
            Action::GetAllOrders => "Orders fetched",
            Action::UpdateOrderStatus => "Order status updated successfully",
            Action::DeleteOrderItem => "OrderItem deleted",
        }
    }

    /// Reply message when the underlying operation fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Action::GetProduct => "Error getting product",
            Action::CreateProduct => "Error creating product",
            Action::EditProduct => "Error updating product",
            Action::DeleteProduct => "Error deleting product",
            Action::CreateOrderItem => "Error creating order item",
            Action::GetAllOrderItems => "Error fetching order items",
            Action::GetOrderItemsByUser => "Error retrieving order items",
            Action::GetAllOrders => "Error fetching orders",
            Action::UpdateOrderStatus => "Error updating order status",
            Action::DeleteOrderItem => "Error deleting order item",
        }
    }

    /// Reply message when the payload cannot be decoded.
    pub fn decode_message(&self) -> &'static str {
        match self {
            Action::GetProduct => "Error parsing request data",
            _ => "Error decoding JSON",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| DispatchError::UnknownPattern(s.to_string()))
    }
}

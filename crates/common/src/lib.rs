//! Shared value types for the restaurant orders service.

pub mod status;
pub mod types;

pub use status::{OrderStatus, ParseStatusError};
pub use types::{Money, OrderId, OrderItemId, ProductId, TableNumber, UserId};

//! Order aggregate manager: an order and its items form one consistency
//! boundary.

mod commands;
mod service;

pub use commands::{AddItem, RemoveItem, UpdateOrderStatus};
pub use service::OrderService;

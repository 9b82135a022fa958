//! Transactional persistence for products, orders and order items.
//!
//! The [`Store`] trait is the boundary the domain layer talks to. Reads go
//! straight to the store; multi-step writes run inside a
//! [`StoreTransaction`] that rolls back unless explicitly committed.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use error::{PENDING_ORDER_CONSTRAINT, PRODUCT_NAME_CONSTRAINT, Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use record::{NewOrder, NewOrderItem, NewProduct, Order, OrderItem, Product};
pub use store::{Store, StoreTransaction};

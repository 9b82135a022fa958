//! Domain layer for the restaurant orders service.
//!
//! This crate provides:
//! - `CatalogService` for product lookups and catalog writes
//! - `OrderService` for attaching and detaching items, status changes and
//!   the read projections over orders
//! - Typed commands and the `DomainError` taxonomy

pub mod catalog;
pub mod error;
pub mod order;
mod transaction;

pub use catalog::{CatalogService, CreateProduct, UpdateProduct};
pub use error::{DomainError, ErrorKind, Result};
pub use order::{AddItem, OrderService, RemoveItem, UpdateOrderStatus};

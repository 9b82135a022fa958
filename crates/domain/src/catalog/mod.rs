//! Product catalog: products are looked up by id or by their unique name.

mod commands;
mod service;

pub use commands::{CreateProduct, UpdateProduct};
pub use service::CatalogService;

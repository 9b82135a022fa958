//! Domain error types.

use common::{OrderId, OrderItemId, OrderStatus};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during catalog and order operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No product matches the given id or name.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// No order with the given id exists.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// No order item with the given id exists.
    #[error("Order item not found: {0}")]
    OrderItemNotFound(OrderItemId),

    /// The order item exists but was never attached to an order.
    #[error("Order item {0} is not attached to an order")]
    ItemNotAttached(OrderItemId),

    /// Another product already uses this name.
    #[error("Product name already exists: {0}")]
    DuplicateName(String),

    /// The product is still referenced by order items.
    #[error("Product {0} is still referenced by order items")]
    ProductInUse(String),

    /// A command carried invalid arguments.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requested status change is not allowed.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// The order is settled and its items can no longer change.
    #[error("Order {id} is {status} and can no longer be modified")]
    OrderClosed { id: OrderId, status: OrderStatus },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Coarse classification of failures, used in replies, logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    DuplicateName,
    Validation,
    TransactionFailure,
    /// Raised by the dispatch boundary when a deadline expires.
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::DuplicateName => "duplicate_name",
            ErrorKind::Validation => "validation",
            ErrorKind::TransactionFailure => "transaction_failure",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DomainError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::ProductNotFound(_)
            | DomainError::OrderNotFound(_)
            | DomainError::OrderItemNotFound(_)
            | DomainError::ItemNotAttached(_) => ErrorKind::NotFound,
            DomainError::DuplicateName(_) => ErrorKind::DuplicateName,
            DomainError::ProductInUse(_)
            | DomainError::Validation(_)
            | DomainError::InvalidStatusTransition { .. }
            | DomainError::OrderClosed { .. } => ErrorKind::Validation,
            DomainError::Store(_) => ErrorKind::TransactionFailure,
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

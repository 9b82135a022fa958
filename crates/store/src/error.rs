use thiserror::Error;

/// Name of the unique constraint on `products.name`.
pub const PRODUCT_NAME_CONSTRAINT: &str = "products_name_key";

/// Name of the partial unique index allowing one pending order per table.
pub const PENDING_ORDER_CONSTRAINT: &str = "one_pending_order_per_table";

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write violated a uniqueness constraint.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A write would leave a dangling reference.
    #[error("Foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// A row addressed by an update or delete no longer exists.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The item totals of an order do not fit in a money amount.
    #[error("Total of order {order_id} is out of range")]
    TotalOutOfRange { order_id: i64 },

    /// A stored value could not be decoded into its domain type.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if this error is a violation of the named unique constraint.
    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation { constraint };
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation { constraint };
            }
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

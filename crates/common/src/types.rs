use serde::{Deserialize, Serialize};

/// Declares a surrogate-key identifier backed by an `i64` column.
///
/// Wrapping the raw key keeps product, order, item and user ids from being
/// mixed up at call sites.
macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an id from a raw key.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw key.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

surrogate_id!(
    /// Identifier of a catalog product.
    ProductId
);

surrogate_id!(
    /// Identifier of an order (one bill for one table).
    OrderId
);

surrogate_id!(
    /// Identifier of a single line on an order.
    OrderItemId
);

surrogate_id!(
    /// Identifier of the waiter or customer who placed an item.
    UserId
);

/// Number of a restaurant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableNumber(i32);

impl TableNumber {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    /// Table numbers start at 1.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for TableNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for TableNumber {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Money amount in minor currency units (cents).
///
/// Serialized as a bare integer so payloads carry `"price": 500`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    pub fn checked_multiply(&self, quantity: i32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    /// Adds two amounts, returning `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Sums amounts, returning `None` if any partial sum overflows.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

//! Order status state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Served ──► Closed
///    │           │
///    ├───────────┴──────► Cancelled
///    └──────────────────► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Open bill for a table; the only status items can be attached to.
    #[default]
    #[serde(alias = "Pendiente")]
    Pending,

    /// Everything on the bill has been brought to the table.
    Served,

    /// Bill settled (terminal state).
    Closed,

    /// Order voided (terminal state).
    Cancelled,
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct ParseStatusError(pub String);

impl OrderStatus {
    /// Returns true if new items may be attached in this status.
    pub fn accepts_items(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Closed | OrderStatus::Cancelled)
    }

    /// Returns true if an order may move from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Served)
                | (Pending, Closed)
                | (Pending, Cancelled)
                | (Served, Closed)
                | (Served, Cancelled)
        )
    }

    /// Returns the status name as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Served => "Served",
            OrderStatus::Closed => "Closed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "Pendiente" => Ok(OrderStatus::Pending),
            "Served" => Ok(OrderStatus::Served),
            "Closed" => Ok(OrderStatus::Closed),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

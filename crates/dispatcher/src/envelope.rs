//! Inbound and outbound message envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound command message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InboundMessage {
    /// The action verb, e.g. `CREATE_ORDER_ITEM`.
    pub pattern: String,

    /// The action payload; absent for actions that take none.
    #[serde(default)]
    pub data: Value,

    /// Caller-supplied message id, used as the correlation id when the
    /// transport does not carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl InboundMessage {
    /// Decodes an envelope from a raw message body.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }
}

/// Outcome flag of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// The uniform reply envelope.
///
/// On success `data` is the JSON-encoded result; on error it is the error
/// text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub success: ReplyStatus,
    pub message: String,
    pub data: Value,
}

impl Reply {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: ReplyStatus::Success,
            message: message.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            success: ReplyStatus::Error,
            message: message.into(),
            data: Value::String(cause.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success == ReplyStatus::Success
    }
}

//! Dispatch error types with reply mapping.

use std::time::Duration;

use domain::{DomainError, ErrorKind};
use thiserror::Error;

use crate::action::Action;
use crate::envelope::Reply;

/// Errors raised while handling one inbound message.
///
/// Every variant is turned into an error reply; none of them ends the
/// dispatch loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The body is not a valid message envelope.
    #[error("Malformed message: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// No handler exists for the pattern.
    #[error("Unknown pattern: {0}")]
    UnknownPattern(String),

    /// The payload does not match the action's expected shape.
    #[error("Invalid payload for {action}: {reason}")]
    Decode { action: Action, reason: String },

    /// The catalog or order operation failed.
    #[error("{action} failed: {source}")]
    Domain {
        action: Action,
        #[source]
        source: DomainError,
    },

    /// The result could not be serialized into the reply.
    #[error("Error encoding reply: {0}")]
    Encode(#[source] serde_json::Error),

    /// The operation did not finish before the deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl DispatchError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::MalformedEnvelope(_)
            | DispatchError::UnknownPattern(_)
            | DispatchError::Decode { .. } => ErrorKind::Validation,
            DispatchError::Domain { source, .. } => source.kind(),
            DispatchError::Encode(_) => ErrorKind::TransactionFailure,
            DispatchError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Builds the error reply for this failure.
    ///
    /// The message names what failed; the data carries the cause.
    pub fn into_reply(self) -> Reply {
        match self {
            DispatchError::MalformedEnvelope(err) => {
                Reply::error("Error decoding JSON", err.to_string())
            }
            DispatchError::UnknownPattern(pattern) => Reply::error(
                format!("Unknown pattern: {pattern}"),
                format!("no handler for pattern {pattern}"),
            ),
            DispatchError::Decode { action, reason } => {
                Reply::error(action.decode_message(), reason)
            }
            DispatchError::Domain { action, source } => {
                Reply::error(action.failure_message(), source.to_string())
            }
            DispatchError::Encode(err) => Reply::error("Error marshaling JSON", err.to_string()),
            DispatchError::Timeout(limit) => Reply::error(
                "Request timed out",
                format!("operation exceeded {} ms", limit.as_millis()),
            ),
        }
    }
}

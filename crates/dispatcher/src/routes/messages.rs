//! Message ingress endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use store::Store;
use tracing::Instrument;

use crate::AppState;
use crate::envelope::{InboundMessage, Reply};
use crate::error::DispatchError;

/// Header carrying the correlation id in both directions.
pub const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// POST /messages — body is a full `{pattern, data, id}` envelope.
pub async fn receive<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match InboundMessage::from_slice(&body) {
        Ok(message) => {
            let correlation_id = correlation_id(&headers, message.id.as_deref());
            let span = tracing::info_span!("message", %correlation_id, pattern = %message.pattern);
            let reply = state
                .dispatcher
                .dispatch(&message.pattern, message.data)
                .instrument(span)
                .await;
            respond(&correlation_id, reply)
        }
        Err(err) => {
            let correlation_id = correlation_id(&headers, None);
            let reply = state
                .dispatcher
                .reject(DispatchError::MalformedEnvelope(err));
            respond(&correlation_id, reply)
        }
    }
}

/// POST /messages/{pattern} — the pattern is in the path and the body is
/// the raw payload.
pub async fn receive_pattern<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(pattern): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = correlation_id(&headers, None);

    let data = if body.iter().all(u8::is_ascii_whitespace) {
        Ok(Value::Null)
    } else {
        serde_json::from_slice::<Value>(&body)
    };

    let reply = match data {
        Ok(data) => {
            let span = tracing::info_span!("message", %correlation_id, %pattern);
            state
                .dispatcher
                .dispatch(&pattern, data)
                .instrument(span)
                .await
        }
        Err(err) => state
            .dispatcher
            .reject(DispatchError::MalformedEnvelope(err)),
    };
    respond(&correlation_id, reply)
}

/// Picks the transport header, then the envelope id, then a fresh id.
fn correlation_id(headers: &HeaderMap, envelope_id: Option<&str>) -> String {
    headers
        .get(&CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .or(envelope_id.filter(|id| !id.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Replies are always sent with 200; the envelope carries the outcome.
fn respond(correlation_id: &str, reply: Reply) -> Response {
    let mut response = Json(reply).into_response();
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

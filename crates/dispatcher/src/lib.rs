//! Request dispatcher for the restaurant orders service.
//!
//! Inbound messages carry an action pattern and a JSON payload. Each one is
//! routed to a single catalog or order operation and answered with a
//! `{success, message, data}` reply. Messages arrive over HTTP; the service
//! also exposes health and Prometheus metrics endpoints.

pub mod action;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod payload;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use action::Action;
pub use config::Config;
pub use envelope::{InboundMessage, Reply, ReplyStatus};
pub use error::DispatchError;
pub use handler::{DEFAULT_TIMEOUT, Dispatcher};

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub dispatcher: Dispatcher<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/messages", post(routes::messages::receive::<S>))
        .route(
            "/messages/{pattern}",
            post(routes::messages::receive_pattern::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a store.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    timeout: Duration,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        dispatcher: Dispatcher::new(store, timeout),
    })
}

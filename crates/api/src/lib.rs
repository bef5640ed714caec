//! HTTP API server with observability for the fulfillment ledger.
//!
//! Provides REST endpoints for order intake and status transitions,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use fulfillment::FulfillmentEngine;
use ledger_store::LedgerStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: LedgerStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}", delete(routes::orders::remove::<S>))
        .route("/orders/{id}/transition", post(routes::orders::transition::<S>))
        .route("/orders/{id}/movements", get(routes::orders::movements::<S>))
        .route("/orders/{id}/worklog", get(routes::orders::worklog::<S>))
        .route("/sku-options", post(routes::options::create::<S>))
        .route("/sku-options/{id}", get(routes::options::get::<S>))
        .route("/accounts", post(routes::accounts::create::<S>))
        .route("/accounts/{id}", get(routes::accounts::get::<S>))
        .route("/accounts/{id}/movements", get(routes::accounts::movements::<S>))
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

/// Creates the application state around a fulfillment engine.
pub fn create_state<S: LedgerStore>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        engine: FulfillmentEngine::new(store),
    })
}

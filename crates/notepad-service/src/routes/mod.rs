//! HTTP routes for the notepad service.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::middleware::http_metrics::http_metrics_middleware;
use crate::repositories::StoreHealthCheck;
use crate::services::SessionCoordinator;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Overall per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,

    /// Shared store ping for the readiness probe.
    pub store_health: Arc<dyn StoreHealthCheck>,
}

/// Build the application routes.
///
/// - `/health` - Liveness probe
/// - `/ready` - Readiness probe (pings the shared store)
/// - `/metrics` - Prometheus metrics
/// - `/api/v1/notepad/*` - Session lifecycle endpoints
/// - TraceLayer, a 30 second request timeout, and HTTP metrics (outermost)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/api/v1/notepad/sessions", post(handlers::create_session))
        .route("/api/v1/notepad/cleanup", post(handlers::cleanup_session))
        .route("/api/v1/notepad/room-ended", post(handlers::room_ended))
        .route("/api/v1/notepad/status", post(handlers::change_status))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Last layer added is outermost: metrics see every response, including timeouts
    api_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

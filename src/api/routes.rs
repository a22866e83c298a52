use axum::{
    routing::{get, patch},
    Router,
};
use http::HeaderName;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::services::AccountLedger;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<AccountLedger>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(ledger: Arc<AccountLedger>) -> Self {
        Self {
            ledger,
            metrics_handle: None,
        }
    }

    /// Adds metrics handle to the state.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Point endpoints
        .route("/point/:id", get(handlers::get_point))
        .route("/point/:id/histories", get(handlers::get_point_histories))
        .route("/point/:id/charge", patch(handlers::charge_point))
        .route("/point/:id/use", patch(handlers::use_point))
        .route("/point/:id/reconcile", get(handlers::reconcile_point))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

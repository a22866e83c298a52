use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::api::requests::PointAmountRequest;
use crate::api::responses::{
    ApiResponse, ErrorResponse, HealthResponse, PointHistoryResponse, PointResponse,
};
use crate::error::AppError;
use crate::services::ReconciliationReport;

use super::routes::AppState;

type ApiError = (StatusCode, Json<ApiResponse<()>>);

/// Maps a ledger error onto an HTTP status and error envelope.
pub fn error_response(err: AppError) -> ApiError {
    let status = match &err {
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        AppError::Busy { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Point request failed: {}", err);
        // Operators need to know which account diverged.
        if matches!(err, AppError::LedgerInconsistency { .. }) {
            err.to_string()
        } else {
            "An internal error occurred".to_string()
        }
    } else {
        err.to_string()
    };

    (
        status,
        Json(ApiResponse::<()>::error(ErrorResponse::new(err.code(), message))),
    )
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        active_locks: state.ledger.lock_registry().active_slots(),
    };

    Json(ApiResponse::success(response))
}

/// Liveness check endpoint.
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus scrape endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> (StatusCode, String) {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

// ============================================================================
// Point Handlers
// ============================================================================

/// Get the point balance of an account.
pub async fn get_point(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PointResponse>>, ApiError> {
    let account = state.ledger.find_balance(id).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(PointResponse::from(account))))
}

/// Get the charge/use history of an account.
pub async fn get_point_histories(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<PointHistoryResponse>>>, ApiError> {
    let records = state.ledger.find_history(id).await.map_err(error_response)?;
    let items = records.into_iter().map(PointHistoryResponse::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

/// Charge points to an account.
pub async fn charge_point(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<PointAmountRequest>,
) -> Result<Json<ApiResponse<PointResponse>>, ApiError> {
    let account = state
        .ledger
        .charge(id, request.amount)
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(PointResponse::from(account))))
}

/// Use points from an account.
pub async fn use_point(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<PointAmountRequest>,
) -> Result<Json<ApiResponse<PointResponse>>, ApiError> {
    let account = state
        .ledger
        .use_point(id, request.amount)
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(PointResponse::from(account))))
}

/// Replay an account's history against its balance.
pub async fn reconcile_point(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ReconciliationReport>>, ApiError> {
    let report = state.ledger.reconcile(id).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(report)))
}

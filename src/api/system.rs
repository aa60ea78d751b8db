//! Status and liveness endpoints.

use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiResponse, AppState, HealthLiveResponse, StatusResponse};

/// Reports service status with a database ping.
///
/// # Endpoint
/// `GET /api/`
///
/// Always answers 200; a failed ping shows up as `"database": "disconnected"`.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatusResponse>> {
    let database = match state.store().ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            "disconnected"
        }
    };

    Json(ApiResponse::success(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.start_time.elapsed().as_secs(),
        database,
    }))
}

/// `GET /healthz`
pub async fn health_live() -> Json<HealthLiveResponse> {
    Json(HealthLiveResponse { status: "alive" })
}

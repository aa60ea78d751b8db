use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::models::catalog::Chapter;

/// `GET /api/chapters/{id}`
pub async fn get_chapter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Arc<Chapter>>>, ApiError> {
    let chapter = state.catalog().get_chapter(&id).await?;
    Ok(Json(ApiResponse::success(chapter)))
}

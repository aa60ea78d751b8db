use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, ListNovelsQuery, SearchQuery};
use crate::api::validation::{validate_page, validate_search_query};
use crate::models::catalog::{ChaptersList, Novel, NovelSort, NovelsPage, SitemapItem};

/// `GET /api/novels?page=&sort=`
///
/// Unknown sort keys fall back to the default ordering.
pub async fn list_novels(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListNovelsQuery>,
) -> Result<Json<ApiResponse<Arc<NovelsPage>>>, ApiError> {
    let page = validate_page(query.page)?;
    let sort = query
        .sort
        .as_deref()
        .map(NovelSort::parse)
        .unwrap_or_default();

    let novels = state.catalog().list_novels(page, sort).await?;
    Ok(Json(ApiResponse::success(novels)))
}

/// `GET /api/novels/search?q=`
pub async fn search_novels(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<Novel>>>, ApiError> {
    let q = validate_search_query(&query.q)?;
    let results = state.catalog().search(q).await?;
    Ok(Json(ApiResponse::success(results)))
}

pub async fn sitemap_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Arc<Vec<SitemapItem>>>>, ApiError> {
    let items = state.catalog().sitemap_data().await?;
    Ok(Json(ApiResponse::success(items)))
}

pub async fn get_novel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Arc<Novel>>>, ApiError> {
    let novel = state.catalog().get_novel(&id).await?;
    Ok(Json(ApiResponse::success(novel)))
}

/// `GET /api/novels/{id}/chapters`
pub async fn list_chapters(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Arc<ChaptersList>>>, ApiError> {
    let chapters = state.catalog().list_chapters(&id).await?;
    Ok(Json(ApiResponse::success(chapters)))
}

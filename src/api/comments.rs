use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, CreateCommentRequest, PageQuery};
use crate::api::validation::{require_header, validate_page};
use crate::constants::headers;
use crate::models::comment::{Comment, CommentsPage};
use crate::services::comment_service::NewComment;

/// `GET /api/chapters/{chapterId}/comments?page=`
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(chapter_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<CommentsPage>>, ApiError> {
    let page = validate_page(query.page)?;
    let comments = state.comments().list_approved(&chapter_id, page).await?;
    Ok(Json(ApiResponse::success(comments)))
}

/// `POST /api/chapters/{chapterId}/comments`
///
/// The comment is stored as pending. Moderation delivery runs in the
/// background and outlives this request.
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Path(chapter_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<Json<ApiResponse<Comment>>, ApiError> {
    let profile_id = require_header(&headers, headers::PROFILE_ID)?;
    let secret = require_header(&headers, headers::SECRET_TOKEN)?;
    tracing::Span::current().record("profile_id", profile_id);

    let created = state
        .comments()
        .create(NewComment {
            profile_id: profile_id.to_string(),
            secret_token: secret.to_string(),
            chapter_id,
            content: payload.content,
            captcha_token: payload.turnstile_token,
        })
        .await?;

    Ok(Json(ApiResponse::success(created.comment)))
}

//! Pseudonymous profile endpoints.
//!
//! Profiles authenticate with the pair (`id`, secret token). The token is
//! only handed out on creation and on sync-code login.

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, AvatarRequest, CreateProfileRequest, LoginRequest,
    MessageResponse, SyncCookiesRequest, UpdateNameRequest,
};
use crate::api::validation::{
    decode_image_payload, require_header, validate_captcha_token, validate_sync_code,
};
use crate::constants::headers;
use crate::models::profile::{
    CookiesResponse, LoginResponse, ProfilePublic, ProfileWithToken, SyncCodeResponse,
};

fn record_profile(profile_id: &str) {
    tracing::Span::current().record("profile_id", profile_id);
}

/// `POST /api/profile`
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProfileRequest>,
) -> Result<Json<ApiResponse<ProfileWithToken>>, ApiError> {
    let token = validate_captcha_token(&payload.turnstile_token)?;
    let profile = state.profiles().create(token).await?;
    record_profile(&profile.profile.id);
    Ok(Json(ApiResponse::success(profile)))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProfilePublic>>, ApiError> {
    let profile = state.profiles().get(&id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// `DELETE /api/profile/{id}`, removing the profile and its comments.
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let secret = require_header(&headers, headers::SECRET_TOKEN)?;
    record_profile(&id);

    state.profiles().delete(&id, secret).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Profile deleted".to_string(),
    })))
}

/// `POST /api/profile/{id}/sync-code`
pub async fn generate_sync_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<SyncCodeResponse>>, ApiError> {
    let secret = require_header(&headers, headers::SECRET_TOKEN)?;
    record_profile(&id);

    let code = state.profiles().generate_sync_code(&id, secret).await?;
    Ok(Json(ApiResponse::success(code)))
}

/// `POST /api/profile/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let code = validate_sync_code(&payload.sync_code)?;
    let login = state.profiles().login_with_code(code).await?;
    record_profile(&login.profile.id);
    Ok(Json(ApiResponse::success(login)))
}

/// `POST /api/profile/sync-cookies`
///
/// Credentials travel in `X-Profile-ID` and `X-Secret-Token`.
pub async fn sync_cookies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SyncCookiesRequest>,
) -> Result<Json<ApiResponse<CookiesResponse>>, ApiError> {
    let profile_id = require_header(&headers, headers::PROFILE_ID)?;
    let secret = require_header(&headers, headers::SECRET_TOKEN)?;
    record_profile(profile_id);

    let cookies = state
        .profiles()
        .sync_cookies(profile_id, secret, payload.cookies)
        .await?;

    Ok(Json(ApiResponse::success(CookiesResponse { cookies })))
}

/// `PATCH /api/profile/{id}/name`
pub async fn update_name(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateNameRequest>,
) -> Result<Json<ApiResponse<ProfilePublic>>, ApiError> {
    let secret = require_header(&headers, headers::SECRET_TOKEN)?;
    record_profile(&id);

    let profile = state
        .profiles()
        .update_display_name(&id, secret, &payload.display_name)
        .await?;

    Ok(Json(ApiResponse::success(profile)))
}

/// `POST /api/profile/{id}/avatar`
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<AvatarRequest>,
) -> Result<Json<ApiResponse<ProfilePublic>>, ApiError> {
    let secret = require_header(&headers, headers::SECRET_TOKEN)?;
    record_profile(&id);

    let max_bytes = state.config().media.max_upload_bytes;
    let image = decode_image_payload(&payload.image, max_bytes)?;

    let profile = state.profiles().update_avatar(&id, secret, image).await?;
    Ok(Json(ApiResponse::success(profile)))
}

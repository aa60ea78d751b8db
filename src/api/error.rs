use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::{CatalogError, CommentError, ProfileError};

pub const COMMENT_COOLDOWN_MESSAGE: &str =
    "Подождите 30 секунд перед отправкой следующего комментария";

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ExternalApiError { service: String, message: String },

    ValidationError(String),

    Conflict(String),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),

    RateLimited(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::ExternalApiError { service, message } => {
                write!(f, "{service} error: {message}")
            }
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::RateLimited(msg) => write!(f, "Rate limited: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            Self::ExternalApiError { service, message } => {
                tracing::warn!("{} API error: {}", service, message);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("{service} service is unavailable"),
                )
            }
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            // Internal retries ran out.
            Self::Conflict(msg) => {
                tracing::error!("Conflict: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(format!("{err:#}"))
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::CaptchaRejected => Self::validation("Captcha verification failed"),
            ProfileError::NotFound => Self::NotFound("Profile not found".to_string()),
            ProfileError::Forbidden => Self::Forbidden("Invalid secret token".to_string()),
            ProfileError::InvalidOrExpired => {
                Self::NotFound("Invalid or expired sync code".to_string())
            }
            ProfileError::InvalidName(msg) => Self::ValidationError(msg),
            ProfileError::UnsupportedFormat => {
                Self::validation("Only JPEG and PNG images are supported")
            }
            ProfileError::InvalidImage(msg) => {
                Self::ValidationError(format!("Invalid image: {msg}"))
            }
            ProfileError::Conflict(msg) => Self::Conflict(msg),
            ProfileError::Upstream(msg) => Self::ExternalApiError {
                service: "Storage".to_string(),
                message: msg,
            },
            ProfileError::Database(msg) => Self::DatabaseError(msg),
            ProfileError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<CommentError> for ApiError {
    fn from(err: CommentError) -> Self {
        match err {
            CommentError::InvalidLength { max } => {
                Self::ValidationError(format!("Comment must be 1-{max} characters"))
            }
            CommentError::RateLimited => Self::RateLimited(COMMENT_COOLDOWN_MESSAGE.to_string()),
            CommentError::CaptchaRejected => Self::validation("Captcha verification failed"),
            CommentError::ChapterNotFound => Self::NotFound("Chapter not found".to_string()),
            CommentError::Forbidden => Self::Forbidden("Invalid credentials".to_string()),
            CommentError::Database(msg) => Self::DatabaseError(msg),
            CommentError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NovelNotFound => Self::NotFound("Novel not found".to_string()),
            CatalogError::ChapterNotFound => Self::NotFound("Chapter not found".to_string()),
            CatalogError::InvalidQuery(msg) => Self::ValidationError(msg),
            CatalogError::Database(msg) => Self::DatabaseError(msg),
            CatalogError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_reported_as_internal_error() {
        let response = ApiError::Conflict("sync code retries exhausted".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn cooldown_maps_to_too_many_requests() {
        let response = ApiError::from(CommentError::RateLimited).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn expired_sync_code_maps_to_not_found() {
        let response = ApiError::from(ProfileError::InvalidOrExpired).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn upstream_failure_maps_to_bad_gateway() {
        let response = ApiError::from(ProfileError::Upstream("timeout".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}

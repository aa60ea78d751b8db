use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::profile::CookieValue;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ListNovelsQuery {
    pub page: Option<u64>,
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    #[serde(default)]
    pub turnstile_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub sync_code: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNameRequest {
    pub display_name: String,
}

/// Avatar upload. `image` is base64, optionally as a `data:` URL.
#[derive(Debug, Deserialize)]
pub struct AvatarRequest {
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncCookiesRequest {
    #[serde(default)]
    pub cookies: HashMap<String, CookieValue>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default)]
    pub turnstile_token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime: u64,
    pub database: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthLiveResponse {
    pub status: &'static str,
}

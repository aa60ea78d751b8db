//! Pseudonymous profiles: creation, token auth, device sync and cosmetics.

use std::collections::HashMap;

use thiserror::Error;

use crate::models::profile::{
    CookieBag, CookieValue, LoginResponse, ProfilePublic, ProfileWithToken, SyncCodeResponse,
};
use crate::services::avatar::AvatarError;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Captcha verification failed")]
    CaptchaRejected,

    #[error("Profile not found")]
    NotFound,

    #[error("Invalid secret token")]
    Forbidden,

    #[error("Invalid or expired sync code")]
    InvalidOrExpired,

    #[error("Invalid display name: {0}")]
    InvalidName(String),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ProfileError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ProfileError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<AvatarError> for ProfileError {
    fn from(err: AvatarError) -> Self {
        match err {
            AvatarError::UnsupportedFormat => Self::UnsupportedFormat,
            AvatarError::Decode(msg) => Self::InvalidImage(msg),
            AvatarError::Encode(msg) => Self::Internal(msg),
            AvatarError::Closed => Self::Internal(err.to_string()),
        }
    }
}

#[async_trait::async_trait]
pub trait ProfileService: Send + Sync {
    /// Creates a profile after a passed captcha. The secret token is only
    /// ever returned here and on sync-code login.
    async fn create(&self, captcha_token: &str) -> Result<ProfileWithToken, ProfileError>;

    /// Constant-time token check. Unknown profiles authenticate as false.
    async fn authenticate(&self, profile_id: &str, secret_token: &str)
    -> Result<bool, ProfileError>;

    /// Public view of a profile. Counts as activity.
    async fn get(&self, profile_id: &str) -> Result<ProfilePublic, ProfileError>;

    /// Issues a fresh 15-minute code, replacing any pending one.
    async fn generate_sync_code(
        &self,
        profile_id: &str,
        secret_token: &str,
    ) -> Result<SyncCodeResponse, ProfileError>;

    /// Consumes a sync code. A code logs in at most once.
    async fn login_with_code(&self, code: &str) -> Result<LoginResponse, ProfileError>;

    /// Merges client cookies into the stored bag and returns the result.
    async fn sync_cookies(
        &self,
        profile_id: &str,
        secret_token: &str,
        cookies: HashMap<String, CookieValue>,
    ) -> Result<CookieBag, ProfileError>;

    async fn update_display_name(
        &self,
        profile_id: &str,
        secret_token: &str,
        name: &str,
    ) -> Result<ProfilePublic, ProfileError>;

    /// Accepts JPEG or PNG bytes of any size within the upload limit.
    async fn update_avatar(
        &self,
        profile_id: &str,
        secret_token: &str,
        image: Vec<u8>,
    ) -> Result<ProfilePublic, ProfileError>;

    /// Deletes the profile and, through the foreign key, its comments.
    async fn delete(&self, profile_id: &str, secret_token: &str) -> Result<(), ProfileError>;
}

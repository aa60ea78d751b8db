use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::users;

/// One mirrored preference cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieValue {
    pub value: String,
    /// Client-supplied timestamp, compared as-is when merging.
    pub updated_at: i64,
}

/// Cookie name to value. Ordered so the stored JSON is stable.
pub type CookieBag = BTreeMap<String, CookieValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePublic {
    pub id: String,
    pub display_name: String,
    pub avatar_seed: String,
    pub has_custom_avatar: bool,
    /// Public URL of the uploaded avatar, when there is one.
    pub avatar_url: Option<String>,
    pub created_at: String,
}

impl ProfilePublic {
    #[must_use]
    pub fn from_model(model: &users::Model, media_base_url: &str) -> Self {
        let avatar_url = model
            .has_custom_avatar
            .then(|| avatar_url(media_base_url, &model.id));
        Self {
            id: model.id.clone(),
            display_name: model.display_name.clone(),
            avatar_seed: model.avatar_seed.clone(),
            has_custom_avatar: model.has_custom_avatar,
            avatar_url,
            created_at: model.created_at.clone(),
        }
    }
}

#[must_use]
pub fn avatar_url(media_base_url: &str, profile_id: &str) -> String {
    format!(
        "{}/{}",
        media_base_url.trim_end_matches('/'),
        crate::services::avatar::avatar_key(profile_id)
    )
}

/// Returned to the owner only: on creation and on sync-code login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileWithToken {
    #[serde(flatten)]
    pub profile: ProfilePublic,
    pub secret_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCodeResponse {
    pub sync_code: String,
    /// RFC 3339.
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub profile: ProfilePublic,
    pub secret_token: String,
    pub cookies: CookieBag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookiesResponse {
    pub cookies: CookieBag,
}

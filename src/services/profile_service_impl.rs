//! `SeaORM` implementation of the `ProfileService` trait.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use sea_orm::Set;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clients::captcha::{CaptchaPurpose, CaptchaVerifier};
use crate::clients::storage::AvatarStore;
use crate::constants::profile::{
    DISPLAY_NAME_MAX_CHARS, SYNC_CODE_LEN, SYNC_CODE_MAX_ATTEMPTS, SYNC_CODE_TTL_MINUTES,
};
use crate::constants::timeouts;
use crate::db::{Store, SyncCodeWrite, format_timestamp, now_timestamp, with_timeout};
use crate::entities::users;
use crate::models::profile::{
    CookieBag, CookieValue, LoginResponse, ProfilePublic, ProfileWithToken, SyncCodeResponse,
};
use crate::services::avatar::{AvatarProcessor, avatar_key};
use crate::services::markdown::strip_markup;
use crate::services::profile_service::{ProfileError, ProfileService};
use crate::services::{cookies, tokens};

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static DISPLAY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N} ]+$").expect("valid display name regex"));

/// Strips markup, collapses whitespace and checks the result.
pub fn clean_display_name(raw: &str) -> Result<String, ProfileError> {
    let stripped = strip_markup(raw);
    let name = WHITESPACE_RUN.replace_all(&stripped, " ");
    let name = name.trim();

    if name.is_empty() {
        return Err(ProfileError::InvalidName("name is empty".to_string()));
    }
    if name.chars().count() > DISPLAY_NAME_MAX_CHARS {
        return Err(ProfileError::InvalidName(format!(
            "name is longer than {DISPLAY_NAME_MAX_CHARS} characters"
        )));
    }
    if !DISPLAY_NAME.is_match(name) {
        return Err(ProfileError::InvalidName(
            "only letters, digits and spaces are allowed".to_string(),
        ));
    }

    Ok(name.to_string())
}

/// Uppercased, trimmed code if it has the right length.
fn normalize_sync_code(code: &str) -> Option<String> {
    let code = code.trim().to_uppercase();
    (code.chars().count() == SYNC_CODE_LEN).then_some(code)
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileTimeouts {
    pub captcha: Duration,
    pub upload: Duration,
}

pub struct SeaOrmProfileService {
    store: Store,
    captcha: Arc<dyn CaptchaVerifier>,
    avatars: Arc<dyn AvatarStore>,
    processor: AvatarProcessor,
    media_base_url: String,
    timeouts: ProfileTimeouts,
    sync_codes: fn() -> String,
}

impl SeaOrmProfileService {
    #[must_use]
    pub fn new(
        store: Store,
        captcha: Arc<dyn CaptchaVerifier>,
        avatars: Arc<dyn AvatarStore>,
        processor: AvatarProcessor,
        media_base_url: String,
        timeouts: ProfileTimeouts,
    ) -> Self {
        Self {
            store,
            captcha,
            avatars,
            processor,
            media_base_url,
            timeouts,
            sync_codes: tokens::new_sync_code,
        }
    }

    /// Replaces the sync code generator.
    #[must_use]
    pub fn with_sync_code_source(mut self, source: fn() -> String) -> Self {
        self.sync_codes = source;
        self
    }

    fn public(&self, model: &users::Model) -> ProfilePublic {
        ProfilePublic::from_model(model, &self.media_base_url)
    }

    async fn load(&self, profile_id: &str) -> Result<Option<users::Model>, ProfileError> {
        Ok(with_timeout(timeouts::DB_QUERY, self.store.profiles().get(profile_id)).await?)
    }

    /// The profile row, if `secret_token` belongs to it.
    async fn authorize(
        &self,
        profile_id: &str,
        secret_token: &str,
    ) -> Result<users::Model, ProfileError> {
        match self.load(profile_id).await? {
            Some(model) if tokens_match(&model.secret_token, secret_token) => Ok(model),
            _ => Err(ProfileError::Forbidden),
        }
    }

    async fn verify_captcha(&self, token: &str) -> Result<(), ProfileError> {
        let verdict = tokio::time::timeout(
            self.timeouts.captcha,
            self.captcha.verify(CaptchaPurpose::Profile, token),
        )
        .await;

        match verdict {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(ProfileError::CaptchaRejected),
            Ok(Err(e)) => {
                error!("Captcha verification failed: {e:#}");
                Err(ProfileError::CaptchaRejected)
            }
            Err(_) => {
                error!("Captcha verification timed out");
                Err(ProfileError::CaptchaRejected)
            }
        }
    }
}

fn tokens_match(stored: &str, provided: &str) -> bool {
    stored.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[async_trait]
impl ProfileService for SeaOrmProfileService {
    async fn create(&self, captcha_token: &str) -> Result<ProfileWithToken, ProfileError> {
        self.verify_captcha(captcha_token).await?;

        let now = now_timestamp();
        let secret_token = tokens::new_secret_token();
        let active = users::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            secret_token: Set(secret_token.clone()),
            display_name: Set(tokens::new_display_name()),
            avatar_seed: Set(tokens::new_avatar_seed()),
            has_custom_avatar: Set(false),
            cookies: Set("{}".to_string()),
            sync_code: Set(None),
            sync_code_expires_at: Set(None),
            created_at: Set(now.clone()),
            last_active_at: Set(now),
        };

        let model =
            with_timeout(timeouts::DB_QUERY, self.store.profiles().insert(active)).await?;

        info!(profile_id = %model.id, "Profile created");
        metrics::counter!("kappalib_profiles_created_total").increment(1);

        Ok(ProfileWithToken {
            profile: self.public(&model),
            secret_token,
        })
    }

    async fn authenticate(
        &self,
        profile_id: &str,
        secret_token: &str,
    ) -> Result<bool, ProfileError> {
        Ok(self
            .load(profile_id)
            .await?
            .is_some_and(|model| tokens_match(&model.secret_token, secret_token)))
    }

    async fn get(&self, profile_id: &str) -> Result<ProfilePublic, ProfileError> {
        let model = self.load(profile_id).await?.ok_or(ProfileError::NotFound)?;

        if let Err(e) = self
            .store
            .profiles()
            .touch(profile_id, &now_timestamp())
            .await
        {
            warn!(profile_id, "Failed to bump last activity: {e:#}");
        }

        Ok(self.public(&model))
    }

    async fn generate_sync_code(
        &self,
        profile_id: &str,
        secret_token: &str,
    ) -> Result<SyncCodeResponse, ProfileError> {
        self.authorize(profile_id, secret_token).await?;

        let ttl = chrono::Duration::minutes(SYNC_CODE_TTL_MINUTES);
        let expires_at = format_timestamp(Utc::now() + ttl);

        for attempt in 1..=SYNC_CODE_MAX_ATTEMPTS {
            let code = (self.sync_codes)();
            let written = with_timeout(
                timeouts::DB_QUERY,
                self.store
                    .profiles()
                    .set_sync_code(profile_id, &code, &expires_at),
            )
            .await?;

            match written {
                SyncCodeWrite::Stored => {
                    info!(profile_id, "Sync code issued");
                    return Ok(SyncCodeResponse {
                        sync_code: code,
                        expires_at,
                    });
                }
                SyncCodeWrite::Collision => {
                    warn!(profile_id, attempt, "Sync code collision, retrying");
                }
                SyncCodeWrite::Missing => return Err(ProfileError::NotFound),
            }
        }

        Err(ProfileError::Conflict(
            "could not allocate a unique sync code".to_string(),
        ))
    }

    async fn login_with_code(&self, code: &str) -> Result<LoginResponse, ProfileError> {
        let code = normalize_sync_code(code).ok_or(ProfileError::InvalidOrExpired)?;
        let now = now_timestamp();
        let profiles = self.store.profiles();

        let model = with_timeout(timeouts::DB_QUERY, profiles.find_by_valid_code(&code, &now))
            .await?
            .ok_or(ProfileError::InvalidOrExpired)?;

        let consumed = with_timeout(
            timeouts::DB_QUERY,
            profiles.consume_sync_code(&model.id, &code, &now),
        )
        .await?;
        if !consumed {
            return Err(ProfileError::InvalidOrExpired);
        }

        info!(profile_id = %model.id, "Sync code login");

        Ok(LoginResponse {
            profile: self.public(&model),
            secret_token: model.secret_token.clone(),
            cookies: cookies::parse_stored(&model.cookies),
        })
    }

    async fn sync_cookies(
        &self,
        profile_id: &str,
        secret_token: &str,
        incoming: HashMap<String, CookieValue>,
    ) -> Result<CookieBag, ProfileError> {
        let incoming = cookies::validate(incoming);
        let model = self.authorize(profile_id, secret_token).await?;

        let merged = cookies::merge(cookies::parse_stored(&model.cookies), incoming);
        let json = serde_json::to_string(&merged)
            .map_err(|e| ProfileError::Internal(e.to_string()))?;

        let updated = with_timeout(
            timeouts::DB_QUERY,
            self.store
                .profiles()
                .update_cookies(profile_id, &json, &now_timestamp()),
        )
        .await?;
        if !updated {
            return Err(ProfileError::NotFound);
        }

        Ok(merged)
    }

    async fn update_display_name(
        &self,
        profile_id: &str,
        secret_token: &str,
        name: &str,
    ) -> Result<ProfilePublic, ProfileError> {
        let name = clean_display_name(name)?;
        let mut model = self.authorize(profile_id, secret_token).await?;

        let updated = with_timeout(
            timeouts::DB_QUERY,
            self.store.profiles().update_display_name(profile_id, &name),
        )
        .await?;
        if !updated {
            return Err(ProfileError::NotFound);
        }

        model.display_name = name;
        Ok(self.public(&model))
    }

    async fn update_avatar(
        &self,
        profile_id: &str,
        secret_token: &str,
        image: Vec<u8>,
    ) -> Result<ProfilePublic, ProfileError> {
        let mut model = self.authorize(profile_id, secret_token).await?;

        let jpeg = self.processor.process(image).await?;

        let key = avatar_key(profile_id);
        match tokio::time::timeout(self.timeouts.upload, self.avatars.put(&key, jpeg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(profile_id, "Avatar upload failed: {e:#}");
                return Err(ProfileError::Upstream("avatar upload failed".to_string()));
            }
            Err(_) => {
                error!(profile_id, "Avatar upload timed out");
                return Err(ProfileError::Upstream("avatar upload timed out".to_string()));
            }
        }

        let updated = with_timeout(
            timeouts::DB_QUERY,
            self.store.profiles().set_custom_avatar(profile_id),
        )
        .await?;
        if !updated {
            return Err(ProfileError::NotFound);
        }

        info!(profile_id, "Avatar updated");
        model.has_custom_avatar = true;
        Ok(self.public(&model))
    }

    async fn delete(&self, profile_id: &str, secret_token: &str) -> Result<(), ProfileError> {
        let model = self.authorize(profile_id, secret_token).await?;

        let deleted =
            with_timeout(timeouts::DB_QUERY, self.store.profiles().delete(profile_id)).await?;
        if deleted == 0 {
            return Err(ProfileError::NotFound);
        }

        if model.has_custom_avatar {
            if let Err(e) = self.avatars.delete(&avatar_key(profile_id)).await {
                warn!(profile_id, "Failed to remove avatar object: {e:#}");
            }
        }

        info!(profile_id, "Profile deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_strips_tags_before_checks() {
        assert_eq!(clean_display_name("<b>Лис</b>").unwrap(), "Лис");
        assert_eq!(
            clean_display_name("  Тихий \n\t  Ёж ").unwrap(),
            "Тихий Ёж"
        );
    }

    #[test]
    fn test_display_name_length_limit() {
        let fifteen = "Ж".repeat(15);
        assert_eq!(clean_display_name(&fifteen).unwrap(), fifteen);

        let sixteen = "Ж".repeat(16);
        assert!(matches!(
            clean_display_name(&sixteen),
            Err(ProfileError::InvalidName(_))
        ));

        // Markup does not count towards the limit.
        let wrapped = format!("<i>{fifteen}</i>");
        assert!(clean_display_name(&wrapped).is_ok());
    }

    #[test]
    fn test_display_name_rejects_symbols_and_empty() {
        assert!(clean_display_name("Лис!").is_err());
        assert!(clean_display_name("a_b").is_err());
        assert!(clean_display_name("   ").is_err());
        assert!(clean_display_name("<b></b>").is_err());
        assert!(clean_display_name("Agent 007").is_ok());
    }

    #[test]
    fn test_normalize_sync_code() {
        assert_eq!(normalize_sync_code(" abcd2345 ").as_deref(), Some("ABCD2345"));
        assert_eq!(normalize_sync_code("ABC"), None);
        assert_eq!(normalize_sync_code("ABCDEFGHJ"), None);
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", "ab"));
        assert!(!tokens_match("abc", ""));
    }
}

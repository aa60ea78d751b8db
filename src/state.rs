use std::sync::Arc;
use std::time::Duration;

use crate::api::rate_limit::IpRateLimiter;
use crate::clients::captcha::{CaptchaVerifier, TurnstileClient};
use crate::clients::storage::{AvatarStore, FsAvatarStore};
use crate::clients::telegram::{ModerationChannel, TelegramClient};
use crate::config::Config;
use crate::db::{PoolOptions, Store};
use crate::services::catalog_service_impl::CatalogSettings;
use crate::services::comment_service_impl::CommentSettings;
use crate::services::moderation::DeliverySettings;
use crate::services::profile_service_impl::ProfileTimeouts;
use crate::services::{
    AvatarProcessor, CatalogService, CommentCooldown, CommentService, ModerationQueue,
    ProfileService, SeaOrmCatalogService, SeaOrmCommentService, SeaOrmProfileService,
};

/// Build a shared HTTP client for the external APIs.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("kappalib/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

/// External collaborators, replaceable in tests.
pub struct Dependencies {
    pub captcha: Arc<dyn CaptchaVerifier>,
    pub moderation: Arc<dyn ModerationChannel>,
    pub avatars: Arc<dyn AvatarStore>,
}

impl Dependencies {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let captcha_http = build_shared_http_client(config.captcha.request_timeout_seconds)?;
        let chat_http = build_shared_http_client(config.moderation.request_timeout_seconds)?;

        Ok(Self {
            captcha: Arc::new(TurnstileClient::new(captcha_http, &config.captcha)),
            moderation: Arc::new(TelegramClient::new(chat_http, &config.moderation)),
            avatars: Arc::new(FsAvatarStore::new(&config.media.storage_path)),
        })
    }
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub catalog: Arc<dyn CatalogService>,

    pub profiles: Arc<dyn ProfileService>,

    pub comments: Arc<dyn CommentService>,

    pub cooldown: Arc<CommentCooldown>,

    pub moderation_queue: ModerationQueue,

    pub rate_limiter: Arc<IpRateLimiter>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let deps = Dependencies::from_config(&config)?;
        Self::with_dependencies(config, deps).await
    }

    pub async fn with_dependencies(config: Config, deps: Dependencies) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_url,
            PoolOptions::from(&config.general),
        )
        .await?;
        Ok(Self::from_parts(config, store, deps))
    }

    /// Wires services over an already connected store. Must run inside a
    /// Tokio runtime, since it starts the moderation worker.
    #[must_use]
    pub fn from_parts(config: Config, store: Store, deps: Dependencies) -> Self {
        let (moderation_queue, _worker) = ModerationQueue::start(
            Arc::clone(&deps.moderation),
            store.clone(),
            DeliverySettings::from(&config.moderation),
        );

        let cooldown = Arc::new(CommentCooldown::new(Duration::from_secs(
            config.comments.cooldown_seconds,
        )));

        let catalog = Arc::new(SeaOrmCatalogService::new(
            store.clone(),
            &config.cache,
            CatalogSettings::from(&config.search),
        )) as Arc<dyn CatalogService>;

        let processor = AvatarProcessor::new(
            config.media.max_concurrent_processing,
            config.media.avatar_size,
            config.media.avatar_jpeg_quality,
        );

        let profiles = Arc::new(SeaOrmProfileService::new(
            store.clone(),
            Arc::clone(&deps.captcha),
            Arc::clone(&deps.avatars),
            processor,
            config.media.public_base_url.clone(),
            ProfileTimeouts {
                captcha: Duration::from_secs(config.captcha.request_timeout_seconds),
                upload: Duration::from_secs(config.media.upload_timeout_seconds),
            },
        )) as Arc<dyn ProfileService>;

        let comments = Arc::new(SeaOrmCommentService::new(
            store.clone(),
            Arc::clone(&deps.captcha),
            Arc::clone(&deps.moderation),
            moderation_queue.clone(),
            Arc::clone(&cooldown),
            CommentSettings {
                max_length: config.comments.max_length,
                page_size: config.comments.page_size,
                captcha_timeout: Duration::from_secs(config.captcha.request_timeout_seconds),
                chat_timeout: Duration::from_secs(config.moderation.request_timeout_seconds),
                media_base_url: config.media.public_base_url.clone(),
            },
        )) as Arc<dyn CommentService>;

        let rate_limiter = Arc::new(IpRateLimiter::from_config(&config.server));

        Self {
            config: Arc::new(config),
            store,
            catalog,
            profiles,
            comments,
            cooldown,
            moderation_queue,
            rate_limiter,
        }
    }
}

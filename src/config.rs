use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub captcha: CaptchaConfig,

    pub moderation: ModerationConfig,

    pub media: MediaConfig,

    pub comments: CommentsConfig,

    pub cache: CacheConfig,

    pub search: SearchConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_url: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 0)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,

    /// Lifetime of a pooled connection before it is recycled.
    pub db_max_lifetime_seconds: u64,

    /// Idle connections beyond `min_db_connections` are closed after this long.
    pub db_idle_timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/kappalib.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 0,
            max_db_connections: 25,
            min_db_connections: 5,
            db_max_lifetime_seconds: 60 * 60,
            db_idle_timeout_seconds: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Requests carrying this value in `X-Service-Token` skip the per-IP limiter.
    /// Empty disables the bypass.
    pub service_token: String,

    /// Sustained requests per second allowed for one client IP.
    pub rate_limit_per_second: u32,

    pub rate_limit_burst: u32,

    /// Visitors idle for longer than this are dropped from the limiter.
    pub rate_limit_idle_seconds: u64,

    /// Trusted proxy IP addresses allowed to provide forwarded client IP headers.
    ///
    /// When empty, forwarded headers are ignored and the socket peer address is used.
    pub trusted_proxy_ips: Vec<String>,

    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cors_allowed_origins: vec![
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
            service_token: String::new(),
            rate_limit_per_second: 3,
            rate_limit_burst: 9,
            rate_limit_idle_seconds: 5 * 60,
            trusted_proxy_ips: Vec::new(),
            shutdown_grace_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    pub verify_url: String,

    /// Secret for the profile-creation widget.
    pub profile_secret: String,

    /// Secret for the comment widget.
    pub comment_secret: String,

    pub request_timeout_seconds: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            verify_url: "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string(),
            profile_secret: String::new(),
            comment_secret: String::new(),
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub api_base_url: String,

    pub bot_token: String,

    pub chat_id: String,

    /// Shared secret Telegram echoes in `X-Telegram-Bot-Api-Secret-Token`.
    /// Webhook calls are refused while this is empty.
    pub webhook_secret: String,

    pub request_timeout_seconds: u64,

    /// Deadline for one send attempt. Storing the returned message id runs
    /// under the regular database timeout and is never retried.
    pub delivery_timeout_seconds: u64,

    pub max_delivery_attempts: u32,

    /// Delay before retry `n` is `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,

    pub queue_capacity: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            chat_id: String::new(),
            webhook_secret: String::new(),
            request_timeout_seconds: 10,
            delivery_timeout_seconds: 30,
            max_delivery_attempts: 3,
            retry_backoff_ms: 2000,
            queue_capacity: 256,
        }
    }
}

impl ModerationConfig {
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory avatars are written to; served under `/media`.
    pub storage_path: String,

    /// Public URL prefix used when building avatar links.
    pub public_base_url: String,

    pub avatar_size: u32,

    pub avatar_jpeg_quality: u8,

    pub max_concurrent_processing: usize,

    /// Upper bound for the decoded upload, in bytes.
    pub max_upload_bytes: usize,

    pub upload_timeout_seconds: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            storage_path: "media".to_string(),
            public_base_url: "/media".to_string(),
            avatar_size: 250,
            avatar_jpeg_quality: 85,
            max_concurrent_processing: 5,
            max_upload_bytes: 5 * 1024 * 1024,
            upload_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
    pub max_length: usize,

    pub page_size: u64,

    pub cooldown_seconds: u64,

    pub cooldown_sweep_interval_seconds: u64,

    /// Cooldown entries older than this are evicted by the sweep.
    pub cooldown_retention_seconds: u64,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            max_length: 1000,
            page_size: 12,
            cooldown_seconds: 30,
            cooldown_sweep_interval_seconds: 5 * 60,
            cooldown_retention_seconds: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub novel_ttl_seconds: u64,

    pub chapter_ttl_seconds: u64,

    pub listing_ttl_seconds: u64,

    pub sitemap_ttl_seconds: u64,

    pub purge_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            novel_ttl_seconds: 10 * 60,
            chapter_ttl_seconds: 30 * 60,
            listing_ttl_seconds: 5 * 60,
            sitemap_ttl_seconds: 60 * 60,
            purge_interval_seconds: 10 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,

    pub max_query_length: usize,

    /// Minimum word similarity a column must reach for a novel to match.
    pub similarity_threshold: f32,

    pub page_size: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            max_query_length: 50,
            similarity_threshold: 0.3,
            page_size: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "kappalib".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            captcha: CaptchaConfig::default(),
            moderation: ModerationConfig::default(),
            media: MediaConfig::default(),
            comments: CommentsConfig::default(),
            cache: CacheConfig::default(),
            search: SearchConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Loads the first config file found, then applies environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let paths = Self::config_paths();

        let mut config = paths
            .iter()
            .find(|path| path.exists())
            .map_or_else(
                || {
                    info!("No config file found, using defaults");
                    Ok(Self::default())
                },
                |path| {
                    info!("Loading config from: {}", path.display());
                    Self::load_from_path(path)
                },
            )?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    /// Secrets live in the environment in production; the file only carries defaults.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets: [(&str, &mut String); 7] = [
            ("DATABASE_URL", &mut self.general.database_url),
            ("TURNSTILE_SECRET", &mut self.captcha.profile_secret),
            ("TURNSTILE_COMMENTS_SECRET", &mut self.captcha.comment_secret),
            ("TELEGRAM_BOT_TOKEN", &mut self.moderation.bot_token),
            ("TELEGRAM_CHAT_ID", &mut self.moderation.chat_id),
            ("TELEGRAM_WEBHOOK_SECRET", &mut self.moderation.webhook_secret),
            ("API_TOKEN", &mut self.server.service_token),
        ];

        for (key, slot) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("kappalib").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".kappalib").join("config.toml"));
        }

        paths
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_url.is_empty() {
            anyhow::bail!("general.database_url cannot be empty");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("general.min_db_connections must not exceed max_db_connections");
        }

        if self.media.max_concurrent_processing == 0 {
            anyhow::bail!("media.max_concurrent_processing must be > 0");
        }

        if self.media.avatar_size == 0 {
            anyhow::bail!("media.avatar_size must be > 0");
        }

        if !(1..=100).contains(&self.media.avatar_jpeg_quality) {
            anyhow::bail!("media.avatar_jpeg_quality must be between 1 and 100");
        }

        if self.comments.page_size == 0 || self.search.page_size == 0 {
            anyhow::bail!("page sizes must be > 0");
        }

        if self.moderation.max_delivery_attempts == 0 {
            anyhow::bail!("moderation.max_delivery_attempts must be > 0");
        }

        if !(0.0..=1.0).contains(&self.search.similarity_threshold) {
            anyhow::bail!("search.similarity_threshold must be within 0.0..=1.0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.max_db_connections, 25);
        assert_eq!(config.general.min_db_connections, 5);
        assert_eq!(config.comments.cooldown_seconds, 30);
        assert_eq!(config.media.avatar_size, 250);
        assert_eq!(config.search.max_results, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[moderation]"));
        assert!(toml_str.contains("[cache]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [comments]
            cooldown_seconds = 60
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.comments.cooldown_seconds, 60);

        assert_eq!(config.comments.page_size, 12);
    }

    #[test]
    fn test_env_overrides_only_non_empty_values() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            "TELEGRAM_BOT_TOKEN" => Some("123:abc".to_string()),
            "TELEGRAM_CHAT_ID" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.moderation.bot_token, "123:abc");
        assert!(config.moderation.chat_id.is_empty());
        assert!(!config.moderation.is_configured());
    }

    #[test]
    fn test_validate_rejects_inverted_pool_bounds() {
        let mut config = Config::default();
        config.general.min_db_connections = 30;
        assert!(config.validate().is_err());
    }
}

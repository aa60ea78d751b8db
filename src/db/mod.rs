use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::GeneralConfig;

pub mod migrator;
pub mod repositories;

pub use repositories::chapter::ChapterRepository;
pub use repositories::comment::{ApprovedComment, CommentRepository};
pub use repositories::import::ImportRepository;
pub use repositories::novel::NovelRepository;
pub use repositories::profile::{ProfileRepository, SyncCodeWrite};

/// Pool sizing and connection recycling.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

impl From<&GeneralConfig> for PoolOptions {
    fn from(config: &GeneralConfig) -> Self {
        Self {
            max_connections: config.max_db_connections,
            min_connections: config.min_db_connections,
            max_lifetime: Duration::from_secs(config.db_max_lifetime_seconds),
            idle_timeout: Duration::from_secs(config.db_idle_timeout_seconds),
        }
    }
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, PoolOptions::from(&GeneralConfig::default())).await
    }

    pub async fn with_pool_options(db_url: &str, options: PoolOptions) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if let Some(path_str) = sqlite_file_path(db_url) {
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)
                    .with_context(|| format!("Failed to create database file {path_str}"))?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(options.max_connections)
            .min_connections(options.min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(options.idle_timeout)
            .max_lifetime(options.max_lifetime)
            .sqlx_logging(false);

        let conn = Database::connect(opt)
            .await
            .context("Failed to connect to database")?;

        migrator::Migrator::up(&conn, None)
            .await
            .context("Failed to apply migrations")?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            options.min_connections, options.max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn novels(&self) -> NovelRepository {
        NovelRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn chapters(&self) -> ChapterRepository {
        ChapterRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn profiles(&self) -> ProfileRepository {
        ProfileRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn comments(&self) -> CommentRepository {
        CommentRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn import(&self) -> ImportRepository {
        ImportRepository::new(self.conn.clone())
    }
}

/// File path behind a `sqlite:` URL, `None` for in-memory and other backends.
fn sqlite_file_path(db_url: &str) -> Option<&str> {
    let rest = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(path)
}

/// Stored timestamps are fixed-width UTC RFC 3339, so string order is time
/// order.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[must_use]
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Bound a database call by `limit`.
pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| anyhow::anyhow!("Database operation timed out after {limit:?}"))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(sqlite_file_path("sqlite:data/app.db"), Some("data/app.db"));
        assert_eq!(
            sqlite_file_path("sqlite:///tmp/app.db?mode=rwc"),
            Some("/tmp/app.db")
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/app"), None);
    }

    #[test]
    fn test_timestamps_sort_lexicographically() {
        let earlier = format_timestamp(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let later = format_timestamp(DateTime::from_timestamp(1_700_000_000, 5_000_000).unwrap());
        assert_eq!(earlier, "2023-11-14T22:13:20.000Z");
        assert!(earlier < later);
    }
}

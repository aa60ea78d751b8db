//! Read path over novels and chapters.

use std::sync::Arc;

use thiserror::Error;

use crate::models::catalog::{Chapter, ChaptersList, Novel, NovelSort, NovelsPage, SitemapItem};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Novel not found")]
    NovelNotFound,

    #[error("Chapter not found")]
    ChapterNotFound,

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CatalogError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CatalogError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[async_trait::async_trait]
pub trait CatalogService: Send + Sync {
    async fn get_novel(&self, id: &str) -> Result<Arc<Novel>, CatalogError>;

    /// Pages start at 1. A page past the end is empty but carries totals.
    async fn list_novels(&self, page: u64, sort: NovelSort)
    -> Result<Arc<NovelsPage>, CatalogError>;

    /// Fuzzy match over titles and author, best first.
    async fn search(&self, query: &str) -> Result<Vec<Novel>, CatalogError>;

    async fn sitemap_data(&self) -> Result<Arc<Vec<SitemapItem>>, CatalogError>;

    /// Chapters of a novel ordered by number.
    async fn list_chapters(&self, novel_id: &str) -> Result<Arc<ChaptersList>, CatalogError>;

    async fn get_chapter(&self, id: &str) -> Result<Arc<Chapter>, CatalogError>;

    /// Drops expired cache entries, returning how many were removed.
    async fn purge_expired(&self) -> usize;
}

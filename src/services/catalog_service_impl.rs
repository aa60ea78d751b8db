//! `SeaORM` implementation of the `CatalogService` trait, cached per value
//! family.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{CacheConfig, SearchConfig};
use crate::constants::timeouts;
use crate::db::{Store, with_timeout};
use crate::models::catalog::{
    Chapter, ChapterSummary, ChaptersList, Novel, NovelSort, NovelsPage, SitemapItem,
};
use crate::search::{self, Candidate};
use crate::services::cache::TtlCache;
use crate::services::catalog_service::{CatalogError, CatalogService};

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub page_size: u64,
    pub search_max_results: usize,
    pub search_max_query_chars: usize,
    pub similarity_threshold: f32,
}

impl From<&SearchConfig> for CatalogSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            page_size: config.page_size,
            search_max_results: config.max_results,
            search_max_query_chars: config.max_query_length,
            similarity_threshold: config.similarity_threshold,
        }
    }
}

struct CatalogCaches {
    novels: TtlCache<String, Novel>,
    chapters: TtlCache<String, Chapter>,
    listings: TtlCache<(u64, NovelSort), NovelsPage>,
    chapter_lists: TtlCache<String, ChaptersList>,
    sitemap: TtlCache<(), Vec<SitemapItem>>,
    search_index: TtlCache<(), Vec<Candidate>>,
}

impl CatalogCaches {
    fn new(config: &CacheConfig) -> Self {
        let listing_ttl = Duration::from_secs(config.listing_ttl_seconds);
        Self {
            novels: TtlCache::new("novel", Duration::from_secs(config.novel_ttl_seconds)),
            chapters: TtlCache::new("chapter", Duration::from_secs(config.chapter_ttl_seconds)),
            listings: TtlCache::new("listing", listing_ttl),
            chapter_lists: TtlCache::new("chapter_list", listing_ttl),
            sitemap: TtlCache::new("sitemap", Duration::from_secs(config.sitemap_ttl_seconds)),
            search_index: TtlCache::new("search_index", listing_ttl),
        }
    }
}

pub struct SeaOrmCatalogService {
    store: Store,
    caches: CatalogCaches,
    settings: CatalogSettings,
}

impl SeaOrmCatalogService {
    #[must_use]
    pub fn new(store: Store, cache: &CacheConfig, settings: CatalogSettings) -> Self {
        Self {
            store,
            caches: CatalogCaches::new(cache),
            settings,
        }
    }

    async fn search_index(&self) -> Result<Arc<Vec<Candidate>>, CatalogError> {
        let store = self.store.clone();
        self.caches
            .search_index
            .get_or_fetch((), || async move {
                let candidates =
                    with_timeout(timeouts::DB_QUERY, store.novels().search_candidates()).await?;
                Ok::<_, CatalogError>(Some(candidates))
            })
            .await?
            .ok_or_else(|| CatalogError::Internal("search index unavailable".to_string()))
    }
}

#[async_trait]
impl CatalogService for SeaOrmCatalogService {
    async fn get_novel(&self, id: &str) -> Result<Arc<Novel>, CatalogError> {
        let store = self.store.clone();
        let key = id.to_string();
        self.caches
            .novels
            .get_or_fetch(key.clone(), || async move {
                let model = with_timeout(timeouts::DB_QUERY, store.novels().get(&key)).await?;
                Ok::<_, CatalogError>(model.map(Novel::from))
            })
            .await?
            .ok_or(CatalogError::NovelNotFound)
    }

    async fn list_novels(
        &self,
        page: u64,
        sort: NovelSort,
    ) -> Result<Arc<NovelsPage>, CatalogError> {
        let page = page.max(1);
        let page_size = self.settings.page_size;
        let store = self.store.clone();

        self.caches
            .listings
            .get_or_fetch((page, sort), || async move {
                let novels = store.novels();
                let total_count = with_timeout(timeouts::DB_LISTING, novels.count()).await?;
                let total_pages = total_count.div_ceil(page_size);
                let offset = (page - 1).saturating_mul(page_size);

                let rows = if offset >= total_count {
                    Vec::new()
                } else {
                    with_timeout(
                        timeouts::DB_LISTING,
                        novels.list_page(sort, page_size, offset),
                    )
                    .await?
                };

                Ok::<_, CatalogError>(Some(NovelsPage {
                    novels: rows.into_iter().map(Novel::from).collect(),
                    page,
                    page_size,
                    total_count,
                    total_pages,
                }))
            })
            .await?
            .ok_or_else(|| CatalogError::Internal("listing unavailable".to_string()))
    }

    async fn search(&self, query: &str) -> Result<Vec<Novel>, CatalogError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if query.chars().count() > self.settings.search_max_query_chars {
            return Err(CatalogError::InvalidQuery(format!(
                "query is longer than {} characters",
                self.settings.search_max_query_chars
            )));
        }

        let index = self.search_index().await?;
        let ranked = search::rank(
            query,
            &index,
            self.settings.similarity_threshold,
            self.settings.search_max_results,
        );
        debug!(query, matches = ranked.len(), "Search ranked");
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ranked.iter().map(|r| r.id.clone()).collect();
        let rows = with_timeout(timeouts::DB_QUERY, self.store.novels().get_by_ids(&ids)).await?;
        let mut by_id: HashMap<String, Novel> = rows
            .into_iter()
            .map(|model| (model.id.clone(), Novel::from(model)))
            .collect();

        // Rows deleted since the index was cached simply drop out.
        Ok(ranked
            .into_iter()
            .filter_map(|r| by_id.remove(&r.id))
            .collect())
    }

    async fn sitemap_data(&self) -> Result<Arc<Vec<SitemapItem>>, CatalogError> {
        let store = self.store.clone();
        self.caches
            .sitemap
            .get_or_fetch((), || async move {
                let items = with_timeout(timeouts::DB_LISTING, store.novels().sitemap()).await?;
                Ok::<_, CatalogError>(Some(items))
            })
            .await?
            .ok_or_else(|| CatalogError::Internal("sitemap unavailable".to_string()))
    }

    async fn list_chapters(&self, novel_id: &str) -> Result<Arc<ChaptersList>, CatalogError> {
        let store = self.store.clone();
        let key = novel_id.to_string();
        self.caches
            .chapter_lists
            .get_or_fetch(key.clone(), || async move {
                let rows =
                    with_timeout(timeouts::DB_LISTING, store.chapters().list_for_novel(&key))
                        .await?;
                if rows.is_empty() {
                    let exists =
                        with_timeout(timeouts::DB_QUERY, store.novels().exists(&key)).await?;
                    if !exists {
                        return Ok::<_, CatalogError>(None);
                    }
                }

                let chapters: Vec<ChapterSummary> =
                    rows.into_iter().map(ChapterSummary::from).collect();
                Ok(Some(ChaptersList {
                    count: chapters.len(),
                    chapters,
                    novel_id: key,
                }))
            })
            .await?
            .ok_or(CatalogError::NovelNotFound)
    }

    async fn get_chapter(&self, id: &str) -> Result<Arc<Chapter>, CatalogError> {
        let store = self.store.clone();
        let key = id.to_string();
        self.caches
            .chapters
            .get_or_fetch(key.clone(), || async move {
                let row =
                    with_timeout(timeouts::DB_QUERY, store.chapters().get_with_source(&key))
                        .await?;
                Ok::<_, CatalogError>(
                    row.map(|(chapter, source)| Chapter::from_model(chapter, source)),
                )
            })
            .await?
            .ok_or(CatalogError::ChapterNotFound)
    }

    async fn purge_expired(&self) -> usize {
        let caches = &self.caches;
        caches.novels.purge_expired().await
            + caches.chapters.purge_expired().await
            + caches.listings.purge_expired().await
            + caches.chapter_lists.purge_expired().await
            + caches.sitemap.purge_expired().await
            + caches.search_index.purge_expired().await
    }
}

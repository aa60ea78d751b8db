use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select,
};

use crate::entities::{novels, prelude::*};
use crate::models::catalog::{NovelSort, SitemapItem};
use crate::search::Candidate;

pub struct NovelRepository {
    conn: DatabaseConnection,
}

impl NovelRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: &str) -> Result<Option<novels::Model>> {
        Novels::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query novel")
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        let count = Novels::find()
            .filter(novels::Column::Id.eq(id))
            .count(&self.conn)
            .await
            .context("Failed to check novel")?;
        Ok(count > 0)
    }

    pub async fn count(&self) -> Result<u64> {
        Novels::find()
            .count(&self.conn)
            .await
            .context("Failed to count novels")
    }

    pub async fn list_page(
        &self,
        sort: NovelSort,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<novels::Model>> {
        ordered(Novels::find(), sort)
            .limit(limit)
            .offset(offset)
            .all(&self.conn)
            .await
            .context("Failed to list novels")
    }

    pub async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<novels::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Novels::find()
            .filter(novels::Column::Id.is_in(ids.iter().cloned()))
            .all(&self.conn)
            .await
            .context("Failed to query novels by ids")
    }

    /// Searchable projection of the whole catalog.
    pub async fn search_candidates(&self) -> Result<Vec<Candidate>> {
        let rows: Vec<(String, String, String, String, String)> = Novels::find()
            .select_only()
            .column(novels::Column::Id)
            .column(novels::Column::TitleNormalized)
            .column(novels::Column::TitleEnNormalized)
            .column(novels::Column::AuthorNormalized)
            .column(novels::Column::CreatedAt)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to load search candidates")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, title_normalized, title_en_normalized, author_normalized, created_at)| {
                    Candidate {
                        id,
                        title_normalized,
                        title_en_normalized,
                        author_normalized,
                        created_at,
                    }
                },
            )
            .collect())
    }

    pub async fn sitemap(&self) -> Result<Vec<SitemapItem>> {
        let rows: Vec<(String, String)> = Novels::find()
            .select_only()
            .column(novels::Column::Id)
            .column(novels::Column::CreatedAt)
            .order_by_desc(novels::Column::CreatedAt)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to load sitemap data")?;

        Ok(rows
            .into_iter()
            .map(|(id, created_at)| SitemapItem { id, created_at })
            .collect())
    }
}

fn ordered(query: Select<Novels>, sort: NovelSort) -> Select<Novels> {
    match sort {
        NovelSort::Newest => query
            .order_by_desc(novels::Column::YearStart)
            .order_by_asc(novels::Column::Title),
        NovelSort::Oldest => query
            .order_by_asc(novels::Column::YearStart)
            .order_by_asc(novels::Column::Title),
        NovelSort::Large => query
            .order_by_desc(novels::Column::ChaptersCount)
            .order_by_asc(novels::Column::Title),
        NovelSort::Small => query
            .order_by_asc(novels::Column::ChaptersCount)
            .order_by_asc(novels::Column::Title),
        NovelSort::Alphabet => query
            .order_by_asc(novels::Column::TitleNormalized)
            .order_by_asc(novels::Column::Id),
        NovelSort::Created => query.order_by_desc(novels::Column::CreatedAt),
    }
}

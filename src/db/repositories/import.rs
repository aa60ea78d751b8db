use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::db::now_timestamp;
use crate::entities::{chapters, novels, prelude::*, sources};
use crate::models::catalog::{CatalogImport, ChapterImport, ImportSummary, NovelImport};

const NOVEL_STATUSES: [&str; 3] = ["ongoing", "completed", "announced"];

/// Administrative write path for catalog content.
pub struct ImportRepository {
    conn: DatabaseConnection,
}

impl ImportRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Upserts sources, novels and chapters in one transaction. Novels and
    /// chapters are matched by id, chapters also by `(novel_id, chapter_num)`.
    pub async fn import(&self, document: &CatalogImport) -> Result<ImportSummary> {
        for novel in &document.novels {
            if !NOVEL_STATUSES.contains(&novel.status.as_str()) {
                bail!("Novel '{}' has unknown status '{}'", novel.title, novel.status);
            }
        }

        let txn = self.conn.begin().await.context("Failed to begin import")?;
        let mut summary = ImportSummary::default();

        let mut source_ids: HashMap<String, i32> = HashMap::new();
        for source in &document.sources {
            let id = upsert_source(&txn, &source.name, source.logo_url.clone()).await?;
            source_ids.insert(source.name.clone(), id);
            summary.sources += 1;
        }

        for novel in &document.novels {
            let novel_id = upsert_novel(&txn, novel).await?;
            summary.novels += 1;

            for chapter in &novel.chapters {
                let source_id = match &chapter.source {
                    Some(name) => Some(match source_ids.get(name) {
                        Some(id) => *id,
                        None => {
                            let id = upsert_source(&txn, name, None).await?;
                            source_ids.insert(name.clone(), id);
                            id
                        }
                    }),
                    None => None,
                };
                upsert_chapter(&txn, &novel_id, chapter, source_id).await?;
                summary.chapters += 1;
            }

            let count = Chapters::find()
                .filter(chapters::Column::NovelId.eq(novel_id.as_str()))
                .count(&txn)
                .await
                .context("Failed to count chapters")?;
            novels::ActiveModel {
                id: Set(novel_id),
                chapters_count: Set(i32::try_from(count).unwrap_or(i32::MAX)),
                ..Default::default()
            }
            .update(&txn)
            .await
            .context("Failed to update chapter count")?;
        }

        txn.commit().await.context("Failed to commit import")?;

        info!(
            sources = summary.sources,
            novels = summary.novels,
            chapters = summary.chapters,
            "Catalog import finished"
        );

        Ok(summary)
    }
}

async fn upsert_source(
    txn: &DatabaseTransaction,
    name: &str,
    logo_url: Option<String>,
) -> Result<i32> {
    let existing = Sources::find()
        .filter(sources::Column::Name.eq(name))
        .one(txn)
        .await
        .context("Failed to query source")?;

    if let Some(existing) = existing {
        if logo_url.is_some() && logo_url != existing.logo_url {
            let id = existing.id;
            let mut active: sources::ActiveModel = existing.into();
            active.logo_url = Set(logo_url);
            active.update(txn).await.context("Failed to update source")?;
            return Ok(id);
        }
        return Ok(existing.id);
    }

    let inserted = sources::ActiveModel {
        name: Set(name.to_string()),
        logo_url: Set(logo_url),
        ..Default::default()
    }
    .insert(txn)
    .await
    .context("Failed to insert source")?;

    Ok(inserted.id)
}

async fn upsert_novel(txn: &DatabaseTransaction, novel: &NovelImport) -> Result<String> {
    let existing = match &novel.id {
        Some(id) => Novels::find_by_id(id.as_str())
            .one(txn)
            .await
            .context("Failed to query novel")?,
        None => None,
    };

    let mut active = novels::ActiveModel {
        title: Set(novel.title.clone()),
        title_en: Set(novel.title_en.clone()),
        author: Set(novel.author.clone()),
        year_start: Set(novel.year_start),
        year_end: Set(novel.year_end),
        status: Set(novel.status.clone()),
        description: Set(novel.description.clone()),
        age_rating: Set(novel.age_rating.clone()),
        cover_url: Set(novel.cover_url.clone()),
        ..Default::default()
    };

    if let Some(existing) = existing {
        active.id = Set(existing.id.clone());
        active.update(txn).await.context("Failed to update novel")?;
        return Ok(existing.id);
    }

    let id = novel
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    active.id = Set(id.clone());
    active.chapters_count = Set(0);
    active.created_at = Set(now_timestamp());
    active.insert(txn).await.context("Failed to insert novel")?;

    Ok(id)
}

async fn upsert_chapter(
    txn: &DatabaseTransaction,
    novel_id: &str,
    chapter: &ChapterImport,
    source_id: Option<i32>,
) -> Result<()> {
    let existing = Chapters::find()
        .filter(chapters::Column::NovelId.eq(novel_id))
        .filter(chapters::Column::ChapterNum.eq(chapter.chapter_num))
        .one(txn)
        .await
        .context("Failed to query chapter")?;

    let mut active = chapters::ActiveModel {
        novel_id: Set(novel_id.to_string()),
        chapter_num: Set(chapter.chapter_num),
        title: Set(chapter.title.clone()),
        title_en: Set(chapter.title_en.clone()),
        content: Set(chapter.content.clone()),
        source_id: Set(source_id),
        ..Default::default()
    };

    if let Some(existing) = existing {
        active.id = Set(existing.id);
        active.update(txn).await.context("Failed to update chapter")?;
        return Ok(());
    }

    active.id = Set(chapter
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string()));
    active.created_at = Set(now_timestamp());
    active.insert(txn).await.context("Failed to insert chapter")?;

    Ok(())
}

use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};

use crate::entities::{chapters, prelude::*, sources};

pub struct ChapterRepository {
    conn: DatabaseConnection,
}

impl ChapterRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_novel(&self, novel_id: &str) -> Result<Vec<chapters::Model>> {
        Chapters::find()
            .filter(chapters::Column::NovelId.eq(novel_id))
            .order_by_asc(chapters::Column::ChapterNum)
            .all(&self.conn)
            .await
            .context("Failed to list chapters")
    }

    pub async fn get_with_source(
        &self,
        id: &str,
    ) -> Result<Option<(chapters::Model, Option<sources::Model>)>> {
        Chapters::find_by_id(id)
            .find_also_related(Sources)
            .one(&self.conn)
            .await
            .context("Failed to query chapter")
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        let count = Chapters::find()
            .filter(chapters::Column::Id.eq(id))
            .count(&self.conn)
            .await
            .context("Failed to check chapter")?;
        Ok(count > 0)
    }
}

use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::search::normalize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "novels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub title_en: String,
    pub author: String,
    pub year_start: i32,
    pub year_end: Option<i32>,
    /// One of `ongoing`, `completed`, `announced`.
    pub status: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub age_rating: Option<String>,
    pub cover_url: Option<String>,
    pub chapters_count: i32,
    pub created_at: String,

    /// Lowercased alphanumeric projections of the searchable columns.
    /// Maintained by `before_save`, never written directly.
    pub title_normalized: String,
    pub title_en_normalized: String,
    pub author_normalized: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::chapters::Entity")]
    Chapters,
}

impl Related<super::chapters::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chapters.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if let Set(title) = &self.title {
            self.title_normalized = Set(normalize(title));
        }
        if let Set(title_en) = &self.title_en {
            self.title_en_normalized = Set(normalize(title_en));
        }
        if let Set(author) = &self.author {
            self.author_normalized = Set(normalize(author));
        }
        Ok(self)
    }
}

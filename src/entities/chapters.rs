use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "chapters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub novel_id: String,
    /// Unique per novel, see `idx_chapters_novel_num`.
    pub chapter_num: i32,
    pub title: String,
    pub title_en: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub source_id: Option<i32>,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::novels::Entity",
        from = "Column::NovelId",
        to = "super::novels::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Novels,
    #[sea_orm(
        belongs_to = "super::sources::Entity",
        from = "Column::SourceId",
        to = "super::sources::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Sources,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
}

impl Related<super::novels::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Novels.def()
    }
}

impl Related<super::sources::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sources.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Bearer credential (64-char hex). Only ever returned to its owner.
    pub secret_token: String,

    pub display_name: String,

    /// Input for the external avatar renderer (16-char hex).
    pub avatar_seed: String,

    pub has_custom_avatar: bool,

    /// JSON object of mirrored preference cookies.
    #[sea_orm(column_type = "Text")]
    pub cookies: String,

    #[sea_orm(unique)]
    pub sync_code: Option<String>,

    pub sync_code_expires_at: Option<String>,

    pub created_at: String,

    pub last_active_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

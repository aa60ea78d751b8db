use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use crate::entities::{comments, prelude::*, users};
use crate::models::comment::CommentStatus;

/// An approved comment with its author row.
pub type ApprovedComment = (comments::Model, Option<users::Model>);

pub struct CommentRepository {
    conn: DatabaseConnection,
}

impl CommentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, comment: comments::ActiveModel) -> Result<comments::Model> {
        comment
            .insert(&self.conn)
            .await
            .context("Failed to insert comment")
    }

    pub async fn get(&self, id: &str) -> Result<Option<comments::Model>> {
        Comments::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query comment")
    }

    /// Moves a pending comment to `status`. Returns false when the comment is
    /// missing or already decided.
    pub async fn decide(&self, id: &str, status: CommentStatus) -> Result<bool> {
        let result = Comments::update_many()
            .col_expr(comments::Column::Status, Expr::value(status.as_str()))
            .filter(comments::Column::Id.eq(id))
            .filter(comments::Column::Status.eq(CommentStatus::Pending.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to update comment status")?;
        Ok(result.rows_affected == 1)
    }

    pub async fn set_moderation_message(&self, id: &str, message_id: i64) -> Result<()> {
        Comments::update_many()
            .col_expr(
                comments::Column::ModerationMessageId,
                Expr::value(Some(message_id)),
            )
            .filter(comments::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to store moderation message id")?;
        Ok(())
    }

    pub async fn count_approved(&self, chapter_id: &str) -> Result<u64> {
        Comments::find()
            .filter(comments::Column::ChapterId.eq(chapter_id))
            .filter(comments::Column::Status.eq(CommentStatus::Approved.as_str()))
            .count(&self.conn)
            .await
            .context("Failed to count comments")
    }

    /// Newest first.
    pub async fn list_approved(
        &self,
        chapter_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ApprovedComment>> {
        Comments::find()
            .filter(comments::Column::ChapterId.eq(chapter_id))
            .filter(comments::Column::Status.eq(CommentStatus::Approved.as_str()))
            .order_by_desc(comments::Column::CreatedAt)
            .order_by_desc(comments::Column::Id)
            .limit(limit)
            .offset(offset)
            .find_also_related(Users)
            .all(&self.conn)
            .await
            .context("Failed to list comments")
    }
}

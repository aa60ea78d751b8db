use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, SqlErr,
};

use crate::entities::{prelude::*, users};

/// Outcome of writing a sync code, distinguishing the retryable collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCodeWrite {
    Stored,
    /// Another profile already holds this code.
    Collision,
    /// The profile row is gone.
    Missing,
}

pub struct ProfileRepository {
    conn: DatabaseConnection,
}

impl ProfileRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, profile: users::ActiveModel) -> Result<users::Model> {
        profile
            .insert(&self.conn)
            .await
            .context("Failed to insert profile")
    }

    pub async fn get(&self, id: &str) -> Result<Option<users::Model>> {
        Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query profile")
    }

    /// Bumps `last_active_at`. Returns false when the row does not exist.
    pub async fn touch(&self, id: &str, now: &str) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::LastActiveAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update last activity")?;
        Ok(result.rows_affected > 0)
    }

    /// Overwrites any pending code of the profile.
    pub async fn set_sync_code(
        &self,
        id: &str,
        code: &str,
        expires_at: &str,
    ) -> Result<SyncCodeWrite> {
        let result = Users::update_many()
            .col_expr(users::Column::SyncCode, Expr::value(code))
            .col_expr(users::Column::SyncCodeExpiresAt, Expr::value(expires_at))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await;

        match result {
            Ok(res) if res.rows_affected == 0 => Ok(SyncCodeWrite::Missing),
            Ok(_) => Ok(SyncCodeWrite::Stored),
            Err(e) if is_unique_violation(&e) => Ok(SyncCodeWrite::Collision),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to store sync code")),
        }
    }

    /// Profile holding `code`, if the code has not expired at `now`.
    pub async fn find_by_valid_code(&self, code: &str, now: &str) -> Result<Option<users::Model>> {
        Users::find()
            .filter(users::Column::SyncCode.eq(code))
            .filter(users::Column::SyncCodeExpiresAt.gt(now))
            .one(&self.conn)
            .await
            .context("Failed to query sync code")
    }

    /// Clears the code only if the profile still holds it. Exactly one
    /// concurrent caller sees `true`.
    pub async fn consume_sync_code(&self, id: &str, code: &str, now: &str) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::SyncCode, Expr::value(Option::<String>::None))
            .col_expr(
                users::Column::SyncCodeExpiresAt,
                Expr::value(Option::<String>::None),
            )
            .col_expr(users::Column::LastActiveAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::SyncCode.eq(code))
            .exec(&self.conn)
            .await
            .context("Failed to consume sync code")?;
        Ok(result.rows_affected == 1)
    }

    /// Frees expired codes so they stop occupying the unique index.
    pub async fn clear_expired_sync_codes(&self, now: &str) -> Result<u64> {
        let result = Users::update_many()
            .col_expr(users::Column::SyncCode, Expr::value(Option::<String>::None))
            .col_expr(
                users::Column::SyncCodeExpiresAt,
                Expr::value(Option::<String>::None),
            )
            .filter(users::Column::SyncCode.is_not_null())
            .filter(users::Column::SyncCodeExpiresAt.lte(now))
            .exec(&self.conn)
            .await
            .context("Failed to clear expired sync codes")?;
        Ok(result.rows_affected)
    }

    pub async fn update_cookies(&self, id: &str, cookies_json: &str, now: &str) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::Cookies, Expr::value(cookies_json))
            .col_expr(users::Column::LastActiveAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update cookies")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn update_display_name(&self, id: &str, name: &str) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::DisplayName, Expr::value(name))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update display name")?;
        Ok(result.rows_affected > 0)
    }

    pub async fn set_custom_avatar(&self, id: &str) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::HasCustomAvatar, Expr::value(true))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to flag custom avatar")?;
        Ok(result.rows_affected > 0)
    }

    /// Returns the number of deleted rows. Comments go with the profile.
    pub async fn delete(&self, id: &str) -> Result<u64> {
        let result = Users::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete profile")?;
        Ok(result.rows_affected)
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

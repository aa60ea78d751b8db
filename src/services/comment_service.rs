//! Chapter comments and their moderation lifecycle.

use thiserror::Error;

use crate::clients::telegram::CallbackQuery;
use crate::models::comment::{Comment, CommentStatus, CommentsPage};
use crate::services::moderation::DeliveryTicket;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("Comment must be between 1 and {max} characters")]
    InvalidLength { max: usize },

    #[error("Comment cooldown active")]
    RateLimited,

    #[error("Captcha verification failed")]
    CaptchaRejected,

    #[error("Chapter not found")]
    ChapterNotFound,

    #[error("Invalid profile credentials")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CommentError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CommentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub profile_id: String,
    pub secret_token: String,
    pub chapter_id: String,
    pub content: String,
    pub captcha_token: String,
}

/// A stored comment plus the handle of its moderation delivery.
pub struct CreatedComment {
    pub comment: Comment,
    pub delivery: DeliveryTicket,
}

/// What a moderation callback asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    #[must_use]
    pub const fn status(self) -> CommentStatus {
        match self {
            Self::Approve => CommentStatus::Approved,
            Self::Reject => CommentStatus::Rejected,
        }
    }
}

/// Result of handling a moderation callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Not a moderation button press, or malformed.
    Ignored,
    /// The comment was already decided or no longer exists.
    Unchanged { comment_id: String },
    Decided {
        comment_id: String,
        status: CommentStatus,
    },
}

#[async_trait::async_trait]
pub trait CommentService: Send + Sync {
    /// Validates, stores as pending and queues the comment for moderation.
    async fn create(&self, input: NewComment) -> Result<CreatedComment, CommentError>;

    /// Applies an approve/reject button press. Chat side effects are best
    /// effort and never undo the status change.
    async fn handle_moderation_callback(
        &self,
        callback: &CallbackQuery,
    ) -> Result<CallbackOutcome, CommentError>;

    /// Approved comments of a chapter, newest first. Pages start at 1.
    async fn list_approved(&self, chapter_id: &str, page: u64)
    -> Result<CommentsPage, CommentError>;
}

//! `SeaORM` implementation of the `CommentService` trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::Set;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clients::captcha::{CaptchaPurpose, CaptchaVerifier};
use crate::clients::telegram::{CallbackQuery, ModerationChannel};
use crate::constants::moderation::{APPROVED_SUFFIX, REJECTED_SUFFIX};
use crate::constants::timeouts;
use crate::db::{Store, now_timestamp, with_timeout};
use crate::entities::{comments, users};
use crate::models::comment::{Comment, CommentStatus, CommentsPage};
use crate::models::profile::avatar_url;
use crate::services::comment_service::{
    CallbackOutcome, CommentError, CommentService, CreatedComment, ModerationAction, NewComment,
};
use crate::services::cooldown::CommentCooldown;
use crate::services::markdown::render_comment_html;
use crate::services::moderation::{ModerationJob, ModerationQueue};

#[derive(Debug, Clone)]
pub struct CommentSettings {
    pub max_length: usize,
    pub page_size: u64,
    pub captcha_timeout: Duration,
    pub chat_timeout: Duration,
    pub media_base_url: String,
}

pub struct SeaOrmCommentService {
    store: Store,
    captcha: Arc<dyn CaptchaVerifier>,
    channel: Arc<dyn ModerationChannel>,
    queue: ModerationQueue,
    cooldown: Arc<CommentCooldown>,
    settings: CommentSettings,
}

impl SeaOrmCommentService {
    #[must_use]
    pub fn new(
        store: Store,
        captcha: Arc<dyn CaptchaVerifier>,
        channel: Arc<dyn ModerationChannel>,
        queue: ModerationQueue,
        cooldown: Arc<CommentCooldown>,
        settings: CommentSettings,
    ) -> Self {
        Self {
            store,
            captcha,
            channel,
            queue,
            cooldown,
            settings,
        }
    }

    fn check_length(&self, content: &str) -> Result<(), CommentError> {
        let len = content.chars().count();
        if content.trim().is_empty() || len > self.settings.max_length {
            return Err(CommentError::InvalidLength {
                max: self.settings.max_length,
            });
        }
        Ok(())
    }

    async fn verify_captcha(&self, token: &str) -> Result<(), CommentError> {
        let verdict = tokio::time::timeout(
            self.settings.captcha_timeout,
            self.captcha.verify(CaptchaPurpose::Comment, token),
        )
        .await;

        match verdict {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(CommentError::CaptchaRejected),
            Ok(Err(e)) => {
                error!("Captcha verification failed: {e:#}");
                Err(CommentError::CaptchaRejected)
            }
            Err(_) => {
                error!("Captcha verification timed out");
                Err(CommentError::CaptchaRejected)
            }
        }
    }

    async fn author(
        &self,
        profile_id: &str,
        secret_token: &str,
    ) -> Result<users::Model, CommentError> {
        let profile =
            with_timeout(timeouts::DB_QUERY, self.store.profiles().get(profile_id)).await?;
        match profile {
            Some(model)
                if bool::from(model.secret_token.as_bytes().ct_eq(secret_token.as_bytes())) =>
            {
                Ok(model)
            }
            _ => Err(CommentError::Forbidden),
        }
    }

    fn to_comment(&self, model: comments::Model, author: Option<&users::Model>) -> Comment {
        let status = CommentStatus::parse(&model.status).unwrap_or(CommentStatus::Pending);
        let (display_name, avatar_seed, has_custom_avatar) = author.map_or_else(
            || (String::new(), String::new(), false),
            |a| {
                (
                    a.display_name.clone(),
                    a.avatar_seed.clone(),
                    a.has_custom_avatar,
                )
            },
        );
        let user_avatar_url =
            has_custom_avatar.then(|| avatar_url(&self.settings.media_base_url, &model.user_id));

        Comment {
            id: model.id,
            chapter_id: model.chapter_id,
            user_id: model.user_id,
            content_html: model.content_html,
            status,
            created_at: model.created_at,
            user_display_name: display_name,
            user_avatar_seed: avatar_seed,
            user_has_custom_avatar: has_custom_avatar,
            user_avatar_url,
        }
    }

    /// Edits the notification and answers the button press. Errors are
    /// logged only.
    async fn acknowledge(&self, callback: &CallbackQuery, status_text: Option<&str>) {
        if let (Some(text), Some(message)) = (status_text, &callback.message) {
            let original = message.text.as_deref().unwrap_or_default();
            let edited = format!("{original}\n\n{text}");
            match tokio::time::timeout(
                self.settings.chat_timeout,
                self.channel.edit_message(message.message_id, &edited),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Failed to edit moderation message: {e:#}"),
                Err(_) => warn!("Editing moderation message timed out"),
            }
        }

        match tokio::time::timeout(
            self.settings.chat_timeout,
            self.channel
                .answer_callback(&callback.id, status_text.unwrap_or_default()),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to answer callback query: {e:#}"),
            Err(_) => warn!("Answering callback query timed out"),
        }
    }
}

#[async_trait]
impl CommentService for SeaOrmCommentService {
    async fn create(&self, input: NewComment) -> Result<CreatedComment, CommentError> {
        self.check_length(&input.content)?;

        // Held until the insert succeeds; any earlier return gives it back.
        let Some(reservation) = self.cooldown.try_reserve(&input.profile_id) else {
            metrics::counter!("kappalib_comments_rate_limited_total").increment(1);
            return Err(CommentError::RateLimited);
        };

        self.verify_captcha(&input.captcha_token).await?;

        let chapter_exists = with_timeout(
            timeouts::DB_QUERY,
            self.store.chapters().exists(&input.chapter_id),
        )
        .await?;
        if !chapter_exists {
            return Err(CommentError::ChapterNotFound);
        }

        let author = self.author(&input.profile_id, &input.secret_token).await?;

        let content_html = render_comment_html(&input.content);

        let active = comments::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            chapter_id: Set(input.chapter_id.clone()),
            user_id: Set(author.id.clone()),
            content_html: Set(content_html),
            status: Set(CommentStatus::Pending.as_str().to_string()),
            moderation_message_id: Set(None),
            created_at: Set(now_timestamp()),
        };
        let model = with_timeout(timeouts::DB_QUERY, self.store.comments().insert(active)).await?;

        reservation.commit();

        info!(comment_id = %model.id, chapter_id = %model.chapter_id, "Comment submitted");
        metrics::counter!("kappalib_comments_created_total").increment(1);

        let delivery = self.queue.enqueue(ModerationJob {
            comment_id: model.id.clone(),
            chapter_id: model.chapter_id.clone(),
            author_name: author.display_name.clone(),
            content_html: model.content_html.clone(),
        });

        Ok(CreatedComment {
            comment: self.to_comment(model, Some(&author)),
            delivery,
        })
    }

    async fn handle_moderation_callback(
        &self,
        callback: &CallbackQuery,
    ) -> Result<CallbackOutcome, CommentError> {
        if callback.message.is_none() {
            return Ok(CallbackOutcome::Ignored);
        }
        let Some((action, comment_id)) = callback.data.as_deref().and_then(|d| d.split_once(':'))
        else {
            return Ok(CallbackOutcome::Ignored);
        };
        let Some(action) = ModerationAction::parse(action) else {
            debug!(action, "Ignoring unknown moderation action");
            return Ok(CallbackOutcome::Ignored);
        };

        let status = action.status();
        let changed = with_timeout(
            timeouts::DB_QUERY,
            self.store.comments().decide(comment_id, status),
        )
        .await?;

        if !changed {
            debug!(comment_id, "Comment already decided or missing");
            self.acknowledge(callback, None).await;
            return Ok(CallbackOutcome::Unchanged {
                comment_id: comment_id.to_string(),
            });
        }

        info!(comment_id, status = status.as_str(), "Comment moderated");
        metrics::counter!("kappalib_comments_moderated_total", "status" => status.as_str())
            .increment(1);

        let status_text = match status {
            CommentStatus::Approved => APPROVED_SUFFIX,
            _ => REJECTED_SUFFIX,
        };
        self.acknowledge(callback, Some(status_text)).await;

        Ok(CallbackOutcome::Decided {
            comment_id: comment_id.to_string(),
            status,
        })
    }

    async fn list_approved(
        &self,
        chapter_id: &str,
        page: u64,
    ) -> Result<CommentsPage, CommentError> {
        let page = page.max(1);
        let page_size = self.settings.page_size;
        let repo = self.store.comments();

        let total = with_timeout(timeouts::DB_QUERY, repo.count_approved(chapter_id)).await?;
        if total == 0 {
            return Ok(CommentsPage::empty(page, page_size));
        }

        let total_pages = total.div_ceil(page_size);
        let offset = (page - 1).saturating_mul(page_size);

        let rows = if offset >= total {
            Vec::new()
        } else {
            with_timeout(
                timeouts::DB_QUERY,
                repo.list_approved(chapter_id, page_size, offset),
            )
            .await?
        };

        let comments = rows
            .into_iter()
            .map(|(comment, author)| self.to_comment(comment, author.as_ref()))
            .collect();

        Ok(CommentsPage {
            comments,
            page,
            page_size,
            total_count: total,
            total_pages,
        })
    }
}

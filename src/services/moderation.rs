//! Comment moderation delivery.
//!
//! New comments are handed to a `ModerationQueue`, whose worker posts them to
//! the moderation chat independently of the request that created them. Each
//! delivery gets a per-attempt deadline and a bounded number of retries; the
//! caller can follow the outcome through a `DeliveryTicket`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clients::telegram::{ModerationChannel, ReviewMessage};
use crate::config::ModerationConfig;
use crate::constants::moderation::{MAX_CALLBACK_ID_BYTES, MAX_MESSAGE_CHARS};
use crate::constants::timeouts;
use crate::db::{Store, with_timeout};
use crate::services::markdown::{LINK_REL, strip_markup};

const EMPTY_PLACEHOLDER: &str = "[без текста]";
const IMAGE_ALT_DEFAULT: &str = "изображение";
const ELLIPSIS: &str = "...";

static IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<img\b[^>]*>").expect("valid img regex"));
static SRC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bsrc="([^"]*)""#).expect("valid src regex"));
static ALT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\balt="([^"]*)""#).expect("valid alt regex"));

/// Converts sanitized comment HTML into the subset the chat accepts.
#[must_use]
pub fn html_to_chat_html(html: &str) -> String {
    if html.trim().is_empty() {
        return EMPTY_PLACEHOLDER.to_string();
    }

    let mut result = html.to_string();
    for level in 1..=6 {
        result = result
            .replace(&format!("<h{level}>"), "<b>")
            .replace(&format!("</h{level}>"), "</b>\n");
    }

    let replacements = [
        ("<p>", ""),
        ("</p>", "\n\n"),
        ("<br>", "\n"),
        ("<br/>", "\n"),
        ("<br />", "\n"),
        ("<ul>", ""),
        ("</ul>", "\n"),
        ("<ol>", ""),
        ("</ol>", "\n"),
        ("<li>", "• "),
        ("</li>", "\n"),
        ("<strong>", "<b>"),
        ("</strong>", "</b>"),
        ("<em>", "<i>"),
        ("</em>", "</i>"),
    ];
    for (from, to) in replacements {
        result = result.replace(from, to);
    }
    result = result.replace(&format!(r#" rel="{LINK_REL}""#), "");

    let result = IMG_TAG.replace_all(&result, |caps: &regex::Captures<'_>| {
        let tag = &caps[0];
        let alt = ALT_ATTR
            .captures(tag)
            .map(|c| c[1].to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| IMAGE_ALT_DEFAULT.to_string());
        match SRC_ATTR.captures(tag) {
            Some(src) if !src[1].is_empty() => format!(r#"<a href="{}">[🖼 {alt}]</a>"#, &src[1]),
            _ => format!("[🖼 {alt}]"),
        }
    });

    let trimmed = result.trim();
    if trimmed.is_empty() {
        EMPTY_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Longest prefix of `input` with at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// Longest prefix of `input` within `max_bytes`, cut on a char boundary.
fn truncate_bytes(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationJob {
    pub comment_id: String,
    pub chapter_id: String,
    pub author_name: String,
    pub content_html: String,
}

fn compose(job: &ModerationJob, body: &str) -> String {
    format!(
        "💬 <b>Новый комментарий</b>\n\n👤 Автор: {}\n📖 Глава: <code>{}</code>\n\n📝 Текст:\n{body}",
        html_escape::encode_text(&job.author_name),
        html_escape::encode_text(&job.chapter_id),
    )
}

/// Builds the review message. Oversized comments fall back to escaped plain
/// text so the cut never lands inside a tag.
#[must_use]
pub fn render_review(job: &ModerationJob) -> ReviewMessage {
    let mut text = compose(job, &html_to_chat_html(&job.content_html));

    if text.chars().count() > MAX_MESSAGE_CHARS {
        let plain = html_escape::encode_text(&strip_markup(&job.content_html)).into_owned();
        let header_len = compose(job, "").chars().count();
        let budget = MAX_MESSAGE_CHARS.saturating_sub(header_len + ELLIPSIS.len());
        let mut body = truncate_chars(&plain, budget).to_string();
        // Never end on a partial entity such as `&am`.
        if let Some(amp) = body.rfind('&') {
            if !body[amp..].contains(';') {
                body.truncate(amp);
            }
        }
        body.push_str(ELLIPSIS);
        text = compose(job, &body);
    }

    let callback_id = truncate_bytes(&job.comment_id, MAX_CALLBACK_ID_BYTES);
    if callback_id.len() < job.comment_id.len() {
        warn!(comment_id = %job.comment_id, "Comment id truncated for callback data");
    }

    ReviewMessage {
        text,
        approve_data: format!("approve:{callback_id}"),
        reject_data: format!("reject:{callback_id}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { message_id: i64 },
    /// Moderation chat not configured.
    Skipped,
    Failed { attempts: u32, error: String },
}

impl DeliveryOutcome {
    const fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Skipped => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Completion handle for one queued delivery. Dropping it does not cancel
/// the delivery.
pub struct DeliveryTicket {
    rx: oneshot::Receiver<DeliveryOutcome>,
}

impl DeliveryTicket {
    fn resolved(outcome: DeliveryOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }

    /// `None` if the worker went away before finishing.
    pub async fn wait(self) -> Option<DeliveryOutcome> {
        self.rx.await.ok()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeliverySettings {
    pub attempt_timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
    pub capacity: usize,
}

impl From<&ModerationConfig> for DeliverySettings {
    fn from(config: &ModerationConfig) -> Self {
        Self {
            attempt_timeout: Duration::from_secs(config.delivery_timeout_seconds),
            max_attempts: config.max_delivery_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
            capacity: config.queue_capacity.max(1),
        }
    }
}

type Envelope = (ModerationJob, oneshot::Sender<DeliveryOutcome>);

#[derive(Clone)]
pub struct ModerationQueue {
    sender: mpsc::Sender<Envelope>,
    /// Accepted jobs whose outcome is not yet known.
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl ModerationQueue {
    /// Spawns the worker. It stops once every queue handle is dropped and
    /// in-flight deliveries have been handed off.
    pub fn start(
        channel: Arc<dyn ModerationChannel>,
        store: Store,
        settings: DeliverySettings,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(settings.capacity);
        let pending = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        let worker = {
            let pending = Arc::clone(&pending);
            let idle = Arc::clone(&idle);
            tokio::spawn(async move {
                while let Some((job, reply)) = receiver.recv().await {
                    let channel = Arc::clone(&channel);
                    let store = store.clone();
                    let pending = Arc::clone(&pending);
                    let idle = Arc::clone(&idle);
                    tokio::spawn(async move {
                        let outcome = deliver(channel.as_ref(), &store, &job, settings).await;
                        metrics::counter!(
                            "kappalib_moderation_deliveries_total",
                            "outcome" => outcome.label()
                        )
                        .increment(1);
                        let _ = reply.send(outcome);
                        if pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                            idle.notify_waiters();
                        }
                    });
                }
                debug!("Moderation queue closed");
            })
        };

        (
            Self {
                sender,
                pending,
                idle,
            },
            worker,
        )
    }

    /// Jobs accepted but not yet resolved.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn release(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Resolves once every accepted job has an outcome.
    pub async fn drain(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Never waits: a full or closed queue resolves the ticket as failed.
    pub fn enqueue(&self, job: ModerationJob) -> DeliveryTicket {
        let (tx, rx) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::AcqRel);
        match self.sender.try_send((job, tx)) {
            Ok(()) => {
                metrics::counter!("kappalib_moderation_enqueued_total").increment(1);
                DeliveryTicket { rx }
            }
            Err(mpsc::error::TrySendError::Full((job, _))) => {
                self.release();
                warn!(comment_id = %job.comment_id, "Moderation queue full, dropping notification");
                metrics::counter!("kappalib_moderation_deliveries_total", "outcome" => "dropped")
                    .increment(1);
                DeliveryTicket::resolved(DeliveryOutcome::Failed {
                    attempts: 0,
                    error: "queue full".to_string(),
                })
            }
            Err(mpsc::error::TrySendError::Closed((job, _))) => {
                self.release();
                error!(comment_id = %job.comment_id, "Moderation queue closed");
                DeliveryTicket::resolved(DeliveryOutcome::Failed {
                    attempts: 0,
                    error: "queue closed".to_string(),
                })
            }
        }
    }
}

async fn deliver(
    channel: &dyn ModerationChannel,
    store: &Store,
    job: &ModerationJob,
    settings: DeliverySettings,
) -> DeliveryOutcome {
    if !channel.is_configured() {
        warn!("Moderation chat credentials not set, skipping notification");
        return DeliveryOutcome::Skipped;
    }

    let message = render_review(job);
    let mut last_error = String::new();

    for attempt in 1..=settings.max_attempts {
        match tokio::time::timeout(settings.attempt_timeout, channel.send_review(&message)).await {
            Ok(Ok(message_id)) => {
                let write_back = with_timeout(
                    timeouts::DB_QUERY,
                    store
                        .comments()
                        .set_moderation_message(&job.comment_id, message_id),
                )
                .await;
                if let Err(e) = write_back {
                    error!(comment_id = %job.comment_id, "Failed to store moderation message id: {e:#}");
                }
                info!(comment_id = %job.comment_id, message_id, attempt, "Comment sent for moderation");
                return DeliveryOutcome::Delivered { message_id };
            }
            Ok(Err(e)) => last_error = format!("{e:#}"),
            Err(_) => last_error = format!("timed out after {:?}", settings.attempt_timeout),
        }

        warn!(
            comment_id = %job.comment_id,
            attempt,
            max_attempts = settings.max_attempts,
            "Moderation delivery failed: {last_error}"
        );

        if attempt < settings.max_attempts {
            tokio::time::sleep(settings.backoff * attempt).await;
        }
    }

    error!(comment_id = %job.comment_id, "Giving up on moderation delivery");
    DeliveryOutcome::Failed {
        attempts: settings.max_attempts,
        error: last_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(content_html: &str) -> ModerationJob {
        ModerationJob {
            comment_id: "c1".to_string(),
            chapter_id: "ch1".to_string(),
            author_name: "Тихий <Лис>".to_string(),
            content_html: content_html.to_string(),
        }
    }

    #[test]
    fn test_html_to_chat_html_conversions() {
        let html = "<h2>Title</h2><p>Hello <strong>bold</strong> <em>it</em></p><ul><li>one</li></ul>";
        assert_eq!(
            html_to_chat_html(html),
            "<b>Title</b>\nHello <b>bold</b> <i>it</i>\n\n• one"
        );
    }

    #[test]
    fn test_html_to_chat_html_images_and_links() {
        let html = r#"<p><img src="https://x.test/a.png" alt="cat"> <img src="https://x.test/b.png"></p>"#;
        assert_eq!(
            html_to_chat_html(html),
            r#"<a href="https://x.test/a.png">[🖼 cat]</a> <a href="https://x.test/b.png">[🖼 изображение]</a>"#
        );

        let html = r#"<p><a href="https://x.test" rel="nofollow noreferrer">x</a></p>"#;
        assert_eq!(html_to_chat_html(html), r#"<a href="https://x.test">x</a>"#);
    }

    #[test]
    fn test_html_to_chat_html_empty() {
        assert_eq!(html_to_chat_html(""), EMPTY_PLACEHOLDER);
        assert_eq!(html_to_chat_html("<p></p>"), EMPTY_PLACEHOLDER);
    }

    #[test]
    fn test_render_review_escapes_author_and_builds_callbacks() {
        let message = render_review(&job("<p>hi</p>"));
        assert!(message.text.contains("Автор: Тихий &lt;Лис&gt;"));
        assert!(message.text.contains("<code>ch1</code>"));
        assert!(message.text.ends_with("Текст:\nhi"));
        assert_eq!(message.approve_data, "approve:c1");
        assert_eq!(message.reject_data, "reject:c1");
    }

    #[test]
    fn test_render_review_truncates_long_messages() {
        let long = format!("<p>{}</p>", "ж".repeat(5000));
        let message = render_review(&job(&long));
        assert!(message.text.chars().count() <= MAX_MESSAGE_CHARS);
        assert!(message.text.ends_with(ELLIPSIS));
        assert!(!message.text.contains("<p>"));
    }

    #[test]
    fn test_callback_id_limited_to_50_bytes() {
        let mut long = job("<p>x</p>");
        long.comment_id = "я".repeat(40);
        let message = render_review(&long);
        let id = message.approve_data.trim_start_matches("approve:");
        assert!(id.len() <= MAX_CALLBACK_ID_BYTES);
        assert_eq!(id.chars().count(), 25);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("абв", 2), "аб");
        assert_eq!(truncate_chars("абв", 5), "абв");
    }
}

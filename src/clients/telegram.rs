use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModerationConfig;

const APPROVE_LABEL: &str = "✅ Подтвердить";
const REJECT_LABEL: &str = "❌ Отклонить";

/// A comment notification with approve/reject buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewMessage {
    /// Chat-flavoured HTML.
    pub text: String,
    pub approve_data: String,
    pub reject_data: String,
}

/// Chat channel where moderators review new comments.
#[async_trait]
pub trait ModerationChannel: Send + Sync {
    /// False when credentials are missing and deliveries should be skipped.
    fn is_configured(&self) -> bool;

    /// Posts the review message, returning its message id.
    async fn send_review(&self, message: &ReviewMessage) -> Result<i64>;

    /// Replaces the text of a posted message and drops its buttons.
    async fn edit_message(&self, message_id: i64, text: &str) -> Result<()>;

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineKeyboardButton<'a>>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Incoming webhook update. Only callback queries are of interest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<CallbackMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMessage {
    pub message_id: i64,
    #[serde(default)]
    pub text: Option<String>,
}

/// Telegram Bot API client.
pub struct TelegramClient {
    client: Client,
    api_base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramClient {
    #[must_use]
    pub fn new(client: Client, config: &ModerationConfig) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.bot_token)
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        form: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let response = self
            .client
            .post(self.method_url(method))
            .form(form)
            .send()
            .await
            .with_context(|| format!("Telegram {method} request failed"))?;

        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to decode Telegram {method} response"))?;

        if !body.ok {
            bail!(
                "Telegram {method} failed ({status}): {}",
                body.description.unwrap_or_default()
            );
        }

        debug!(method, "Telegram call succeeded");
        Ok(body.result)
    }
}

#[async_trait]
impl ModerationChannel for TelegramClient {
    fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }

    async fn send_review(&self, message: &ReviewMessage) -> Result<i64> {
        let keyboard = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![
                InlineKeyboardButton {
                    text: APPROVE_LABEL,
                    callback_data: &message.approve_data,
                },
                InlineKeyboardButton {
                    text: REJECT_LABEL,
                    callback_data: &message.reject_data,
                },
            ]],
        };
        let keyboard = serde_json::to_string(&keyboard)?;

        let sent: Option<SentMessage> = self
            .call(
                "sendMessage",
                &[
                    ("chat_id", self.chat_id.as_str()),
                    ("text", message.text.as_str()),
                    ("parse_mode", "HTML"),
                    ("reply_markup", keyboard.as_str()),
                ],
            )
            .await?;

        sent.map(|m| m.message_id)
            .context("Telegram sendMessage returned no message")
    }

    async fn edit_message(&self, message_id: i64, text: &str) -> Result<()> {
        let message_id = message_id.to_string();
        self.call::<serde_json::Value>(
            "editMessageText",
            &[
                ("chat_id", self.chat_id.as_str()),
                ("message_id", message_id.as_str()),
                ("text", text),
            ],
        )
        .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()> {
        self.call::<serde_json::Value>(
            "answerCallbackQuery",
            &[("callback_query_id", callback_id), ("text", text)],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_parses_callback_query() {
        let json = r#"{
            "update_id": 1,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 5},
                "data": "approve:abc",
                "message": {"message_id": 42, "chat": {"id": 7}, "text": "hello"}
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let callback = update.callback_query.unwrap();
        assert_eq!(callback.id, "cb1");
        assert_eq!(callback.data.as_deref(), Some("approve:abc"));
        let message = callback.message.unwrap();
        assert_eq!(message.message_id, 42);
        assert_eq!(message.text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_update_without_callback() {
        let update: Update = serde_json::from_str(r#"{"update_id": 2, "message": {}}"#).unwrap();
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn test_is_configured_requires_token_and_chat() {
        let mut config = ModerationConfig::default();
        assert!(!TelegramClient::new(Client::new(), &config).is_configured());
        config.bot_token = "t".into();
        config.chat_id = "c".into();
        assert!(TelegramClient::new(Client::new(), &config).is_configured());
    }
}

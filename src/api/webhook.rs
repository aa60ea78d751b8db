//! Telegram bot webhook for moderation button presses.

use axum::{Json, extract::State, http::HeaderMap};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::clients::telegram::Update;
use crate::constants::headers;
use crate::services::comment_service::CallbackOutcome;

/// Refuses every call while no secret is configured.
#[must_use]
pub fn webhook_secret_matches(configured: &str, presented: Option<&str>) -> bool {
    !configured.is_empty()
        && presented.is_some_and(|p| bool::from(p.as_bytes().ct_eq(configured.as_bytes())))
}

/// `POST /api/webhook/telegram`
///
/// Database failures are logged and still answered with success so Telegram
/// does not redeliver the update.
pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let presented = headers
        .get(headers::TELEGRAM_SECRET)
        .and_then(|v| v.to_str().ok());
    if !webhook_secret_matches(&state.config().moderation.webhook_secret, presented) {
        tracing::warn!("Rejected webhook call with invalid secret");
        return Err(ApiError::forbidden("Invalid webhook secret"));
    }

    let message = match update.callback_query {
        None => "ignored",
        Some(callback) => match state.comments().handle_moderation_callback(&callback).await {
            Ok(CallbackOutcome::Decided { .. }) => "decided",
            Ok(CallbackOutcome::Unchanged { .. }) => "unchanged",
            Ok(CallbackOutcome::Ignored) => "ignored",
            Err(e) => {
                tracing::error!(error = %e, "Failed to apply moderation callback");
                "failed"
            }
        },
    };

    Ok(Json(ApiResponse::success(MessageResponse {
        message: message.to_string(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_secret_fails_closed() {
        assert!(!webhook_secret_matches("", None));
        assert!(!webhook_secret_matches("", Some("")));
        assert!(!webhook_secret_matches("s3cret", None));
        assert!(!webhook_secret_matches("s3cret", Some("other")));
        assert!(webhook_secret_matches("s3cret", Some("s3cret")));
    }
}

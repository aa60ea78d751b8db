use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::CaptchaConfig;

/// Which form the token was issued for. Each has its own site secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaPurpose {
    Profile,
    Comment,
}

impl CaptchaPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Comment => "comment",
        }
    }
}

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// `Ok(false)` for a rejected token, `Err` when the verifier could not be
    /// reached.
    async fn verify(&self, purpose: CaptchaPurpose, token: &str) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// Cloudflare Turnstile `siteverify`.
pub struct TurnstileClient {
    client: Client,
    verify_url: String,
    profile_secret: String,
    comment_secret: String,
}

impl TurnstileClient {
    #[must_use]
    pub fn new(client: Client, config: &CaptchaConfig) -> Self {
        Self {
            client,
            verify_url: config.verify_url.clone(),
            profile_secret: config.profile_secret.clone(),
            comment_secret: config.comment_secret.clone(),
        }
    }

    fn secret(&self, purpose: CaptchaPurpose) -> &str {
        match purpose {
            CaptchaPurpose::Profile => &self.profile_secret,
            CaptchaPurpose::Comment => &self.comment_secret,
        }
    }
}

#[async_trait]
impl CaptchaVerifier for TurnstileClient {
    async fn verify(&self, purpose: CaptchaPurpose, token: &str) -> Result<bool> {
        let secret = self.secret(purpose);
        if secret.is_empty() {
            warn!(purpose = purpose.as_str(), "Turnstile secret not set, rejecting token");
            return Ok(false);
        }
        if token.trim().is_empty() {
            return Ok(false);
        }

        let response = self
            .client
            .post(&self.verify_url)
            .form(&[("secret", secret), ("response", token)])
            .send()
            .await
            .context("Turnstile request failed")?;

        let result: SiteVerifyResponse = response
            .json()
            .await
            .context("Failed to decode Turnstile response")?;

        if !result.success {
            debug!(
                purpose = purpose.as_str(),
                errors = ?result.error_codes,
                "Turnstile rejected token"
            );
        }

        metrics::counter!(
            "kappalib_captcha_verifications_total",
            "purpose" => purpose.as_str(),
            "success" => if result.success { "true" } else { "false" }
        )
        .increment(1);

        Ok(result.success)
    }
}

//! Shared harness: a router over a temporary SQLite file with fake
//! captcha, moderation chat and avatar storage.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::time::Duration;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use kappalib::clients::captcha::{CaptchaPurpose, CaptchaVerifier};
use kappalib::clients::storage::AvatarStore;
use kappalib::clients::telegram::{ModerationChannel, ReviewMessage};
use kappalib::config::Config;
use kappalib::db::Store;
use kappalib::models::catalog::CatalogImport;
use kappalib::state::{Dependencies, SharedState};
use serde_json::Value;
use tower::ServiceExt;

pub const CAPTCHA_OK: &str = "captcha-ok";
pub const WEBHOOK_SECRET: &str = "hook-secret";

/// Accepts exactly one token value.
pub struct FakeCaptcha;

#[async_trait]
impl CaptchaVerifier for FakeCaptcha {
    async fn verify(&self, _purpose: CaptchaPurpose, token: &str) -> Result<bool> {
        Ok(token == CAPTCHA_OK)
    }
}

/// Records every call. Sends can be made to fail or hang, edits and
/// callback answers to fail.
#[derive(Default)]
pub struct FakeChannel {
    next_id: AtomicI64,
    pub send_attempts: AtomicU32,
    /// Upcoming sends that return an error.
    pub failing_sends: AtomicU32,
    pub hang_sends: AtomicBool,
    pub fail_edits: AtomicBool,
    pub fail_answers: AtomicBool,
    pub sent: Mutex<Vec<ReviewMessage>>,
    pub edits: Mutex<Vec<(i64, String)>>,
    pub answers: Mutex<Vec<(String, String)>>,
}

impl FakeChannel {
    pub fn fail_next_sends(&self, count: u32) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ModerationChannel for FakeChannel {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send_review(&self, message: &ReviewMessage) -> Result<i64> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.hang_sends.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            anyhow::bail!("chat unavailable");
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 100)
    }

    async fn edit_message(&self, message_id: i64, text: &str) -> Result<()> {
        self.edits
            .lock()
            .unwrap()
            .push((message_id, text.to_string()));
        if self.fail_edits.load(Ordering::SeqCst) {
            anyhow::bail!("edit rejected");
        }
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.to_string()));
        if self.fail_answers.load(Ordering::SeqCst) {
            anyhow::bail!("callback expired");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAvatars {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl AvatarStore for MemoryAvatars {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub shared: Arc<SharedState>,
    pub channel: Arc<FakeChannel>,
    pub avatars: Arc<MemoryAvatars>,
}

pub fn test_config() -> Config {
    let db_path =
        std::env::temp_dir().join(format!("kappalib-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_url = format!("sqlite:{}", db_path.display());
    config.general.min_db_connections = 1;
    config.general.max_db_connections = 5;
    config.moderation.webhook_secret = WEBHOOK_SECRET.to_string();
    config.moderation.retry_backoff_ms = 10;
    config.server.rate_limit_burst = 10_000;
    config.server.rate_limit_per_second = 10_000;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let store = Store::new(&config.general.database_url)
        .await
        .expect("failed to open test database");

    let channel = Arc::new(FakeChannel::default());
    let avatars = Arc::new(MemoryAvatars::default());
    let deps = Dependencies {
        captcha: Arc::new(FakeCaptcha),
        moderation: channel.clone(),
        avatars: avatars.clone(),
    };

    let shared = Arc::new(SharedState::from_parts(config, store, deps));
    let state = kappalib::api::create_app_state(Arc::clone(&shared), None);

    TestApp {
        router: kappalib::api::router(state),
        shared,
        channel,
        avatars,
    }
}

impl TestApp {
    pub async fn import(&self, document: Value) {
        let document: CatalogImport =
            serde_json::from_value(document).expect("invalid import document");
        self.shared
            .store
            .import()
            .import(&document)
            .await
            .expect("import failed");
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> (StatusCode, Value) {
        self.json_request("POST", uri, headers, body).await
    }

    pub async fn json_request(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Creates a profile and returns `(id, secret_token)`.
    pub async fn create_profile(&self) -> (String, String) {
        let (status, body) = self
            .post_json(
                "/api/profile",
                &[],
                &serde_json::json!({ "turnstile_token": CAPTCHA_OK }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            body["data"]["id"].as_str().unwrap().to_string(),
            body["data"]["secret_token"].as_str().unwrap().to_string(),
        )
    }
}

pub fn catalog_fixture() -> Value {
    serde_json::json!({
        "sources": [
            { "name": "Ranobe Hub", "logo_url": "https://example.org/logo.png" }
        ],
        "novels": [
            {
                "id": "dragon-path",
                "title": "Путь дракона",
                "title_en": "The Dragon Path",
                "author": "Ли Вэй",
                "year_start": 2015,
                "year_end": 2019,
                "status": "completed",
                "description": "Юноша ищет путь дракона.",
                "chapters": [
                    {
                        "id": "dragon-path-1",
                        "chapter_num": 1,
                        "title": "Начало",
                        "title_en": "Beginning",
                        "content": "<p>Первая глава</p>",
                        "source": "Ranobe Hub"
                    },
                    {
                        "id": "dragon-path-2",
                        "chapter_num": 2,
                        "title": "Дорога",
                        "content": "<p>Вторая глава</p>"
                    }
                ]
            },
            {
                "id": "silent-moon",
                "title": "Безмолвная луна",
                "title_en": "Silent Moon",
                "author": "Anna Kovach",
                "year_start": 2021,
                "status": "ongoing",
                "chapters": [
                    {
                        "id": "silent-moon-1",
                        "chapter_num": 1,
                        "title": "Ночь",
                        "content": "<p>Ночь</p>"
                    }
                ]
            },
            {
                "id": "iron-garden",
                "title": "Железный сад",
                "title_en": "Iron Garden",
                "author": "Mark Hale",
                "year_start": 2010,
                "status": "announced"
            }
        ]
    })
}

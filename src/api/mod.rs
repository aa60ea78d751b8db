use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, patch, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

mod chapters;
mod comments;
mod error;
mod novels;
mod observability;
mod profiles;
pub mod rate_limit;
mod system;
mod types;
mod validation;
pub mod webhook;

pub use error::{ApiError, COMMENT_COOLDOWN_MESSAGE};
pub use types::*;

use crate::services::{CatalogService, CommentService, ProfileService};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn CatalogService> {
        &self.shared.catalog
    }

    #[must_use]
    pub fn profiles(&self) -> &Arc<dyn ProfileService> {
        &self.shared.profiles
    }

    #[must_use]
    pub fn comments(&self) -> &Arc<dyn CommentService> {
        &self.shared.comments
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let (media_path, cors_origins, max_upload_bytes) = {
        let config = state.config();
        (
            config.media.storage_path.clone(),
            config.server.cors_allowed_origins.clone(),
            config.media.max_upload_bytes,
        )
    };

    // Base64 inflates the image by a third, plus room for the JSON envelope.
    let avatar_body_limit = max_upload_bytes / 3 * 4 + 4096;

    let api_router = Router::new()
        .route("/", get(system::get_status))
        .route("/novels", get(novels::list_novels))
        .route("/novels/search", get(novels::search_novels))
        .route("/novels/sitemap-data", get(novels::sitemap_data))
        .route("/novels/{id}", get(novels::get_novel))
        .route("/novels/{id}/chapters", get(novels::list_chapters))
        .route("/chapters/{id}", get(chapters::get_chapter))
        .route(
            "/chapters/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/profile", post(profiles::create_profile))
        .route("/profile/login", post(profiles::login))
        .route("/profile/sync-cookies", post(profiles::sync_cookies))
        .route(
            "/profile/{id}",
            get(profiles::get_profile).delete(profiles::delete_profile),
        )
        .route("/profile/{id}/sync-code", post(profiles::generate_sync_code))
        .route("/profile/{id}/name", patch(profiles::update_name))
        .route(
            "/profile/{id}/avatar",
            post(profiles::upload_avatar).layer(DefaultBodyLimit::max(avatar_body_limit)),
        )
        .route("/webhook/telegram", post(webhook::telegram_webhook))
        .route("/metrics", get(observability::get_metrics))
        .layer(middleware::from_fn(observability::cache_control_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .with_state(state.clone());

    let cors_layer = if cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .route("/api/", get(system::get_status).with_state(state))
        .route("/healthz", get(system::health_live))
        .nest_service("/media", ServeDir::new(media_path))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(TraceLayer::new_for_http())
}

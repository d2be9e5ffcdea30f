use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

mod db;
mod error;
mod observability;
mod scrape;
mod system;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

use crate::services::ScrapeService;
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn scrape_service(&self) -> &Arc<dyn ScrapeService> {
        &self.shared.scrape_service
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

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().read().await.server.cors_allowed_origins.clone();

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router().with_state(state))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/anime-list", get(scrape::anime_list))
        .route("/anime-details", get(scrape::anime_details))
        .route("/episode-stream", get(scrape::episode_stream))
        .route("/scrape-pages", get(scrape::scrape_pages))
        .route("/scrape-all-pages", get(scrape::scrape_all_pages))
        .route("/scrape-in-batches", get(scrape::scrape_in_batches))
        .route("/streaming-links", get(scrape::streaming_links))
        .route("/hianime-top10", get(scrape::trending_top10))
        .route("/hianime-weekly-top10", get(scrape::weekly_top10))
        .route("/hianime-monthly-top10", get(scrape::monthly_top10))
        .route("/db/anime-list", get(db::anime_list))
        .route("/db/search", get(db::search))
        .route("/db/stats", get(db::stats))
        .route("/db/ranked", get(db::ranked))
        .route("/db/streaming-links", get(db::streaming_links))
        .route("/db/anime-details", get(db::anime_details))
        .route("/remove-anime", delete(db::remove_anime))
        .route("/health", get(system::health))
        .route("/system/config", get(system::get_config))
        .route("/metrics", get(observability::get_metrics))
}

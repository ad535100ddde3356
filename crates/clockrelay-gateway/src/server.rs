//! HTTP server implementation using Axum.

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use clockrelay_core::config::RelayConfig;
use clockrelay_report::RenderOptions;
use clockrelay_store::RelayStore;
use clockrelay_upstream::{RetryPolicy, TrackerClient};

use crate::jobs::JobRegistry;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub store: Arc<RelayStore>,
    pub tracker: TrackerClient,
    pub jobs: JobRegistry,
    pub http: reqwest::Client,
    pub render_options: RenderOptions,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: RelayConfig, store: Arc<RelayStore>, tracker: TrackerClient) -> Self {
        let render_options = RenderOptions::from(config.report);
        Self {
            config,
            store,
            tracker,
            jobs: JobRegistry::new(),
            http: reqwest::Client::new(),
            render_options,
            start_time: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(shared: Arc<AppState>) -> Router {
    Router::new()
        .route("/command", post(crate::dispatch::handle_command))
        .route("/health", get(crate::routes::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server.
pub async fn start(config: RelayConfig) -> anyhow::Result<()> {
    let store = Arc::new(RelayStore::open(std::path::Path::new(&config.db_path))?);
    tracing::info!("💾 Store opened: {}", config.db_path);

    let retry = RetryPolicy::from_config(&config.retry);
    let tracker = TrackerClient::new(&config.tracker, retry);

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, store, tracker));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

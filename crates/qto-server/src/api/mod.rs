//! HTTP API assembly
//!
//! Builds the shared application state, wires the feature routers, and runs
//! the server with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::SqlitePool;
use tokio::signal;

use crate::config::{Config, CorsConfig};
use crate::db::{self, JobStore};
use crate::features;
use crate::ingest::aggregator::CostAggregator;
use crate::ingest::events::JobEvents;
use crate::ingest::extractor::ElementExtractor;
use crate::ingest::gateway::IngestionGateway;
use crate::ingest::rates::RateTable;
use crate::ingest::translation::{HttpTranslationClient, TranslationService};
use crate::ingest::{IngestConfig, Orchestrator};
use crate::middleware;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub gateway: Arc<IngestionGateway>,
    pub orchestrator: Orchestrator,
    pub service: Arc<dyn TranslationService>,
    pub extractor: Arc<ElementExtractor>,
    pub aggregator: Arc<CostAggregator>,
    pub events: JobEvents,
    pub ingest: Arc<IngestConfig>,
}

impl AppState {
    /// Request body ceiling for uploads: the configured file size limit plus
    /// headroom for multipart framing.
    pub fn upload_body_limit(&self) -> usize {
        (self.ingest.max_file_size_bytes as usize).saturating_add(64 * 1024)
    }
}

/// Assemble application state from its externally owned pieces. Exposed so
/// integration tests can build the exact production wiring around a mock
/// translation service.
pub fn build_state(
    pool: SqlitePool,
    service: Arc<dyn TranslationService>,
    ingest: Arc<IngestConfig>,
) -> anyhow::Result<AppState> {
    let rates = Arc::new(match &ingest.rate_table_path {
        Some(path) => {
            let table = RateTable::load(path)?;
            table.validate()?;
            table
        },
        None => RateTable::default(),
    });

    let store = JobStore::new(pool);
    let events = JobEvents::default();

    let gateway = Arc::new(IngestionGateway::new(
        store.clone(),
        service.clone(),
        ingest.clone(),
    ));
    let orchestrator = Orchestrator::new(
        store.clone(),
        service.clone(),
        events.clone(),
        ingest.clone(),
    );

    Ok(AppState {
        store,
        gateway,
        orchestrator,
        service,
        extractor: Arc::new(ElementExtractor::new(rates.clone())),
        aggregator: Arc::new(CostAggregator::new(rates)),
        events,
        ingest,
    })
}

/// Run the server until a shutdown signal arrives.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let ingest = Arc::new(IngestConfig::from_env()?);

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database ready");

    let service: Arc<dyn TranslationService> = Arc::new(HttpTranslationClient::new(
        &ingest.translation,
        ingest.step_timeout(),
    )?);
    tracing::info!(base_url = %ingest.translation.base_url, "Translation client initialized");

    let state = build_state(pool, service, ingest)?;
    let app = create_router(state, &config.cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the application router.
pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    let api_v1 = features::router(state);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(middleware::cors_layer(cors))
        .layer(middleware::tracing_layer())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "QTO Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

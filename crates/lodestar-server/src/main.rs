//! Lodestar Artifacts Server
//!
//! Serves the artifact API and keeps the artifact store in sync with the
//! engagement repositories on GitLab.
//!
//! Uses SQLite (embedded) for the artifact store.

mod error;
mod handlers;
mod settings;
mod storage;

use anyhow::{Context, Result};
use axum::{
    routing::{get, put},
    Router,
};
use lodestar_core::{ArtifactStore, MemoryArtifactStore, SyncEngine};
use lodestar_gitlab::GitlabClient;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use settings::{Settings, StorageBackend};
use storage::SqliteArtifactStore;

const DEFAULT_LOG_FILTER: &str = "lodestar_server=info,lodestar_core=info,lodestar_gitlab=info";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!(
        "Starting Lodestar Artifacts Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, storage={:?}, group={}",
        settings.server.bind_address, settings.storage.backend, settings.sync.group_parent_id
    );

    let store: Arc<dyn ArtifactStore> = match settings.storage.backend {
        StorageBackend::Sqlite => Arc::new(
            SqliteArtifactStore::new(&settings.storage.database_path)
                .await
                .context("Failed to initialize database")?,
        ),
        StorageBackend::Memory => {
            warn!("Using in-memory artifact store; data is lost on restart");
            Arc::new(MemoryArtifactStore::new())
        }
    };

    let repository = Arc::new(
        GitlabClient::new(&settings.gitlab, settings.sync.page_size)
            .context("Failed to create GitLab client")?,
    );

    let engine = Arc::new(SyncEngine::new(store, repository, settings.sync.clone()));

    if settings.server.refresh_on_startup {
        info!("Running startup refresh...");
        match engine.refresh().await {
            Ok(report) => info!(
                projects = report.projects,
                artifacts = report.artifacts,
                failures = report.failures.len(),
                "Startup refresh complete"
            ),
            Err(e) => warn!("Startup refresh failed, serving existing data: {}", e),
        }
    }

    let app = app(AppState { engine });

    let addr: SocketAddr = settings
        .server
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server listening on {}", addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/artifacts",
            get(handlers::artifacts::list).post(handlers::artifacts::process),
        )
        .route("/artifacts/count", get(handlers::artifacts::count))
        .route("/artifacts/refresh", put(handlers::refresh::refresh))
}

//! Event Log Backend
//!
//! Persistence and media backend for a single-tenant event log: two JSON
//! documents with rotating backups, and an update feed with photo attachments.

mod api;
mod config;
mod db;
mod errors;
mod ids;
mod models;
mod storage;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::{BackupManager, DocumentStore, UpdateFeed};
use errors::AppError;
use storage::PhotoStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<DocumentStore>,
    pub backups: Arc<BackupManager>,
    pub feed: Arc<UpdateFeed>,
    pub photos: PhotoStore,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the database and photo store described by `config`.
    pub async fn open(config: Config) -> Result<Self, AppError> {
        let pool = db::init_database(&config.db_path).await?;
        let photos = PhotoStore::from_config(&config.photo_backend).await?;

        let backups = BackupManager::new(pool.clone(), config.max_backups);
        let documents = DocumentStore::new(pool.clone(), backups.clone());
        let feed = UpdateFeed::new(pool, photos.clone());

        Ok(Self {
            documents: Arc::new(documents),
            backups: Arc::new(backups),
            feed: Arc::new(feed),
            photos,
            config: Arc::new(config),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    init_logging(&config);

    tracing::info!("Starting Event Log Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Static directory: {:?}", config.static_dir);
    tracing::info!("Backups kept: {}", config.max_backups);
    tracing::info!("Bind address: {}", config.bind_addr);

    let bind_addr = config.bind_addr;
    let state = AppState::open(config).await?;
    tracing::info!("Photo backend: {}", state.photos.kind());

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Documents
        .route("/settings", get(api::get_settings).post(api::save_settings))
        .route("/data", get(api::get_data).post(api::save_data))
        // Backups
        .route("/backups", get(api::list_backups))
        .route("/backups/restore/{filename}", post(api::restore_backup))
        // Update feed
        .route("/updates", get(api::list_updates).post(api::create_update))
        .route("/updates/{id}", delete(api::delete_update));

    // Web client, manifest and service worker are plain static files
    let static_files = ServeDir::new(&state.config.static_dir);
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .nest("/api", api_routes)
        .route("/uploads/{filename}", get(api::get_upload))
        .route("/health", get(health_check))
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests;

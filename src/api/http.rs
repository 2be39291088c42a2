//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::handlers;
use crate::lifecycle::DataLifecycle;

/// Shared state for all handlers
pub struct AppState {
    pub lifecycle: Arc<DataLifecycle>,
}

impl AppState {
    pub fn new(lifecycle: Arc<DataLifecycle>) -> Self {
        Self { lifecycle }
    }
}

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - allow all origins for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Backups
        .route("/api/backup/export", post(handlers::export_backup))
        .route("/api/backup/stats", get(handlers::backup_stats))
        .route("/api/backup/snapshots", get(handlers::list_snapshots))
        .route("/api/backup/import", post(handlers::import_backup))
        // Archive and deletion
        .route("/api/archive", get(handlers::list_archive))
        .route("/api/curators/:discord_id", delete(handlers::delete_curator))
        .route("/api/servers/:server_id", delete(handlers::delete_server))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

//! Endpoint handlers
//!
//! Every lifecycle call does file I/O, so handlers move it onto the blocking
//! pool and only translate requests and results here.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::http::AppState;
use super::{ApiError, ApiResponse, PaginationParams};
use crate::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::{DataLifecycle, ImportSource};
use crate::types::{ArchiveRecord, EntityKind};

/// Body of `POST /api/backup/import`
#[derive(Debug, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum ImportRequest {
    /// Newest snapshot in the backup directory
    Latest,
    /// A snapshot file in the backup directory, by name
    File { name: String },
    /// An uploaded snapshot document
    Document { document: Value },
}

async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&DataLifecycle) -> LifecycleResult<T> + Send + 'static,
{
    let lifecycle = state.lifecycle.clone();
    let result = tokio::task::spawn_blocking(move || op(&lifecycle))
        .await
        .map_err(|e| ApiError::internal(format!("task failed: {}", e)))?;

    result.map_err(|e| {
        warn!(code = e.code(), error = %e, "request failed");
        ApiError::from(e)
    })
}

/// POST /api/backup/export - Write a new snapshot file
pub async fn export_backup(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let exported = run_blocking(&state, |lifecycle| lifecycle.export_all_data()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(exported))))
}

/// GET /api/backup/stats - Backup directory statistics
pub async fn backup_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = run_blocking(&state, |lifecycle| lifecycle.backup_stats()).await?;
    Ok(Json(ApiResponse::new(stats)))
}

/// GET /api/backup/snapshots - Snapshot files, oldest first
pub async fn list_snapshots(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let snapshots = run_blocking(&state, |lifecycle| lifecycle.backups().list_snapshots()).await?;
    let total = snapshots.len();
    Ok(Json(ApiResponse::with_total(snapshots, total)))
}

/// POST /api/backup/import - Merge a snapshot into the live store
pub async fn import_backup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = run_blocking(&state, move |lifecycle| {
        let source = match request {
            ImportRequest::Latest => ImportSource::Latest,
            ImportRequest::File { name } => lifecycle.snapshot_source(&name)?,
            ImportRequest::Document { document } => {
                // Re-parsed through the codec so uploads get the same checks as files
                let raw = serde_json::to_vec(&document)
                    .map_err(|e| LifecycleError::malformed(e.to_string()))?;
                ImportSource::Bytes(raw)
            }
        };
        lifecycle.import_from(source)
    })
    .await?;

    Ok(Json(ApiResponse::new(report)))
}

/// GET /api/archive - Archived entities with pagination
pub async fn list_archive(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let archive = state.lifecycle.archive();
    let total = archive.len();
    let records: Vec<ArchiveRecord> = archive
        .get_all()
        .skip(params.offset)
        .take(params.normalized_limit())
        .map(|record| record.as_ref().clone())
        .collect();

    Json(ApiResponse::with_total(records, total))
}

/// DELETE /api/curators/:discord_id - Delete and archive a curator
pub async fn delete_curator(
    State(state): State<Arc<AppState>>,
    Path(discord_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    delete_entity(&state, EntityKind::Curator, discord_id).await
}

/// DELETE /api/servers/:server_id - Delete and archive a server
pub async fn delete_server(
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    delete_entity(&state, EntityKind::Server, server_id).await
}

async fn delete_entity(
    state: &AppState,
    kind: EntityKind,
    key: String,
) -> Result<Json<ApiResponse<ArchiveRecord>>, ApiError> {
    if key.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} key must not be blank", kind)));
    }
    let record = run_blocking(state, move |lifecycle| lifecycle.delete_and_archive(kind, &key)).await?;
    Ok(Json(ApiResponse::new(record)))
}

//! Backup endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::ok;
use crate::errors::AppError;
use crate::models::{BackupSummary, OkResponse};
use crate::AppState;

/// GET /api/backups - Backup summaries, newest first.
pub async fn list_backups(State(state): State<AppState>) -> Json<Vec<BackupSummary>> {
    match state.backups.list_backups().await {
        Ok(backups) => Json(backups),
        Err(e) => {
            tracing::warn!("Failed to list backups: {}", e);
            Json(Vec::new())
        }
    }
}

/// POST /api/backups/restore/:filename - Restore a backup.
pub async fn restore_backup(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    state.backups.restore(&filename).await?;
    Ok(ok())
}

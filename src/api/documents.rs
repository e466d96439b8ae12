//! Settings and appdata document endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;

use super::ok;
use crate::errors::AppError;
use crate::models::{DocumentKey, OkResponse};
use crate::AppState;

/// GET /api/settings - Current settings, or null.
pub async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    read_or_null(&state, DocumentKey::Settings).await
}

/// POST /api/settings - Back up, then replace settings.
pub async fn save_settings(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<OkResponse>, AppError> {
    save(&state, DocumentKey::Settings, body).await
}

/// GET /api/data - Current appdata, or null.
pub async fn get_data(State(state): State<AppState>) -> Json<Value> {
    read_or_null(&state, DocumentKey::AppData).await
}

/// POST /api/data - Back up, then replace appdata.
pub async fn save_data(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<OkResponse>, AppError> {
    save(&state, DocumentKey::AppData, body).await
}

async fn read_or_null(state: &AppState, key: DocumentKey) -> Json<Value> {
    match state.documents.get(key).await {
        Ok(value) => Json(value.unwrap_or(Value::Null)),
        Err(e) => {
            tracing::warn!(document = key.as_str(), "Failed to read document: {}", e);
            Json(Value::Null)
        }
    }
}

async fn save(
    state: &AppState,
    key: DocumentKey,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<OkResponse>, AppError> {
    let Json(value) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    state.documents.save(key, &value).await?;
    Ok(ok())
}

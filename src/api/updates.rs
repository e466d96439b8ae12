//! Update feed endpoints.

use axum::{
    extract::{multipart::Field, FromRequest, Multipart, Path, Request, State},
    http::header::CONTENT_TYPE,
    Json,
};
use bytes::BytesMut;
use serde::Serialize;

use super::ok;
use crate::errors::AppError;
use crate::models::{NewUpdate, OkResponse, PhotoUpload, Update};
use crate::AppState;

/// Multipart field carrying the photo.
const PHOTO_FIELD: &str = "photo";

/// Response for a created update.
#[derive(Debug, Serialize)]
pub struct CreatedUpdate {
    pub ok: bool,
    pub update: Update,
}

/// GET /api/updates - The feed, newest first.
pub async fn list_updates(State(state): State<AppState>) -> Json<Vec<Update>> {
    match state.feed.list().await {
        Ok(updates) => Json(updates),
        Err(e) => {
            tracing::warn!("Failed to list updates: {}", e);
            Json(Vec::new())
        }
    }
}

/// POST /api/updates - Create an update.
///
/// Takes a multipart form (optionally with a photo) or a JSON object. Any
/// other body is ignored and the update is created with defaults.
pub async fn create_update(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<CreatedUpdate>, AppError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (fields, photo) = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        read_form(multipart, state.config.max_photo_bytes).await?
    } else if content_type.starts_with("application/json") {
        let Json(fields) = Json::<NewUpdate>::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        (fields, None)
    } else {
        (NewUpdate::default(), None)
    };

    let update = state.feed.insert(&fields, photo).await?;

    Ok(Json(CreatedUpdate { ok: true, update }))
}

/// DELETE /api/updates/:id - Delete an update and its photo.
pub async fn delete_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    state.feed.delete_by_id(&id).await?;
    Ok(ok())
}

/// Collect the known text fields and the photo part from a form.
async fn read_form(
    mut multipart: Multipart,
    max_photo_bytes: usize,
) -> Result<(NewUpdate, Option<PhotoUpload>), AppError> {
    let mut fields = NewUpdate::default();
    let mut photo: Option<PhotoUpload> = None;
    let mut seen_field = false;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            // A form with no parts is just the closing boundary, which the
            // parser rejects; treat it as an empty form
            Err(e) if !seen_field => {
                tracing::debug!("Multipart body has no parts: {}", e);
                break;
            }
            Err(e) => return Err(AppError::BadRequest(format!("Multipart error: {}", e))),
        };
        seen_field = true;

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            PHOTO_FIELD => {
                let original_name = field.file_name().map(String::from);
                let bytes = read_photo(field, max_photo_bytes).await?;
                // Browsers send an empty part when no file was picked
                if !bytes.is_empty() {
                    photo = Some(PhotoUpload {
                        bytes,
                        original_name,
                    });
                }
            }
            "staff" => fields.staff = Some(read_text(field).await?),
            "message" => fields.message = Some(read_text(field).await?),
            "type" => fields.kind = Some(read_text(field).await?),
            "day" => fields.day = Some(read_text(field).await?),
            // id, timestamp and anything else are assigned server-side or ignored
            _ => {}
        }
    }

    Ok((fields, photo))
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))
}

/// Read the photo part, refusing to buffer more than `limit` bytes.
async fn read_photo(mut field: Field<'_>, limit: usize) -> Result<bytes::Bytes, AppError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?
    {
        if buf.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "Photo exceeds the {} byte limit",
                limit
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

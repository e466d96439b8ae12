//! Photo download endpoint.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};

use crate::errors::AppError;
use crate::AppState;

/// GET /uploads/:filename - Stream a stored photo.
pub async fn get_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let photo = state.photos.retrieve(&filename).await.map_err(|e| {
        if !e.is_not_found() {
            tracing::warn!(photo = %filename, "Failed to open photo: {}", e);
        }
        e
    })?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, photo.content_type);
    if let Some(len) = photo.content_length {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }

    builder
        .body(Body::from_stream(photo.body))
        .map_err(|e| AppError::Internal(format!("Response build failed: {}", e)))
}

//! REST API module.
//!
//! Handlers are thin: they translate HTTP into store, backup and feed calls.
//! Reads fail open to `null` or `[]`; writes surface their errors.

mod backups;
mod documents;
mod updates;
mod uploads;

pub use backups::*;
pub use documents::*;
pub use updates::*;
pub use uploads::*;

use axum::Json;

use crate::models::OkResponse;

/// `{ "ok": true }`.
pub fn ok() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

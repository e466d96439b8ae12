//! Named JSON documents.

use serde::Serialize;

/// The two whole-replace documents the client persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKey {
    Settings,
    AppData,
}

impl DocumentKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKey::Settings => "settings",
            DocumentKey::AppData => "appdata",
        }
    }
}

/// `{ "ok": true }` acknowledgement returned by writes.
#[derive(Debug, Clone, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

//! Backup snapshots of the settings and appdata documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable snapshot of both documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Backup {
    pub filename: String,
    pub settings: Option<Value>,
    pub appdata: Option<Value>,
    pub created: String,
}

/// Listing entry for a backup; the payload is left out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupSummary {
    pub filename: String,
    /// Approximate size in bytes of the serialized snapshot
    pub size: i64,
    pub created: String,
}

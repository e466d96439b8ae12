//! Update feed records.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_STAFF: &str = "Anonymous";
pub const DEFAULT_TYPE: &str = "general";

/// A staff-submitted entry in the update feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Update {
    pub id: String,
    pub staff: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub day: i64,
    /// Filename of the attached photo, if any
    pub photo: Option<String>,
    pub timestamp: String,
}

/// Client-supplied fields for a new update. Everything is optional; empty
/// values fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUpdate {
    #[serde(default)]
    pub staff: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Raw day value; parsed leniently
    #[serde(default, deserialize_with = "day_from_json")]
    pub day: Option<String>,
}

impl NewUpdate {
    pub fn staff(&self) -> String {
        non_empty(&self.staff).unwrap_or(DEFAULT_STAFF).to_string()
    }

    pub fn message(&self) -> String {
        non_empty(&self.message).unwrap_or_default().to_string()
    }

    pub fn kind(&self) -> String {
        non_empty(&self.kind).unwrap_or(DEFAULT_TYPE).to_string()
    }

    /// Day as an integer; missing or unparsable values become 0.
    pub fn day(&self) -> i64 {
        self.day
            .as_deref()
            .and_then(|d| d.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }
}

/// Forms send the day as text, JSON clients may send a number.
fn day_from_json<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(day)) => Some(day),
        Some(Value::Number(day)) => Some(day.to_string()),
        _ => None,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Photo bytes received alongside a new update.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub bytes: bytes::Bytes,
    /// Filename as given by the client; only its extension is used
    pub original_name: Option<String>,
}

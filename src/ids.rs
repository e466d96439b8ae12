//! Identifier and filename generation.
//!
//! Every generated name is a time-based prefix plus a random suffix. This
//! avoids collisions at the scale of a single event, nothing more.

use chrono::Utc;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Eight random hex characters.
pub fn random_suffix() -> String {
    let mut suffix = uuid::Uuid::new_v4().simple().to_string();
    suffix.truncate(8);
    suffix
}

/// Fresh id for an update record: base36 unix millis followed by a random suffix.
pub fn update_id() -> String {
    format!("{}{}", to_base36(Utc::now().timestamp_millis().unsigned_abs()), random_suffix())
}

/// Fresh photo filename with the given extension (including the dot).
pub fn photo_filename(extension: &str) -> String {
    format!(
        "{}-{}{}",
        Utc::now().timestamp_millis(),
        random_suffix(),
        extension
    )
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

//! Backup log: retention-bounded snapshots of settings and appdata.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;

use super::{read_document, write_document, WriteLock};
use crate::errors::AppError;
use crate::models::{Backup, BackupSummary, DocumentKey};

pub const BACKUP_PREFIX: &str = "backup-";
pub const BACKUP_SUFFIX: &str = ".json";

/// Fixed-width, so lexicographic order equals chronological order.
const FILENAME_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%6fZ";

/// Creates, lists and restores backups.
#[derive(Clone)]
pub struct BackupManager {
    pool: SqlitePool,
    max_backups: usize,
    lock: WriteLock,
}

impl BackupManager {
    pub fn new(pool: SqlitePool, max_backups: usize) -> Self {
        Self {
            pool,
            max_backups,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Lock shared with the document store.
    pub fn write_lock(&self) -> WriteLock {
        self.lock.clone()
    }

    /// Snapshot the current documents. Returns the new backup's filename, or
    /// `None` when both documents are absent and nothing was written.
    #[cfg(test)]
    pub async fn create_backup(&self) -> Result<Option<String>, AppError> {
        let _guard = self.lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let created = self.create_in(&mut tx).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Backup creation and pruning on a connection the caller already holds.
    /// The caller must hold the write lock.
    pub(crate) async fn create_in(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<String>, AppError> {
        let settings = snapshot(read_document(conn, DocumentKey::Settings).await?);
        let appdata = snapshot(read_document(conn, DocumentKey::AppData).await?);

        if settings.is_none() && appdata.is_none() {
            tracing::debug!("Skipping backup: no documents stored yet");
            return Ok(None);
        }

        let created_at = next_backup_time(conn).await?;
        let filename = backup_filename(created_at);
        let backup = Backup {
            filename: filename.clone(),
            settings,
            appdata,
            created: created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        };

        let size = serde_json::to_vec(&serde_json::json!({
            "settings": backup.settings,
            "appdata": backup.appdata,
            "created": backup.created,
        }))?
        .len() as i64;
        let settings_json = backup.settings.as_ref().map(serde_json::to_string).transpose()?;
        let appdata_json = backup.appdata.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            "INSERT INTO backups (filename, settings, appdata, created, size) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&backup.filename)
        .bind(&settings_json)
        .bind(&appdata_json)
        .bind(&backup.created)
        .bind(size)
        .execute(&mut *conn)
        .await?;

        // Oldest-first eviction down to the retention bound
        let pruned = sqlx::query(
            "DELETE FROM backups WHERE filename NOT IN \
             (SELECT filename FROM backups ORDER BY created DESC, filename DESC LIMIT ?)",
        )
        .bind(self.max_backups as i64)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        tracing::info!(backup = %filename, size, pruned, "Created backup");
        Ok(Some(filename))
    }

    /// All backups, newest first, without their payloads.
    pub async fn list_backups(&self) -> Result<Vec<BackupSummary>, AppError> {
        let rows = sqlx::query(
            "SELECT filename, size, created FROM backups ORDER BY created DESC, filename DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| BackupSummary {
                filename: row.get("filename"),
                size: row.get("size"),
                created: row.get("created"),
            })
            .collect())
    }

    /// Full backup by filename.
    #[cfg(test)]
    pub async fn get_backup(&self, filename: &str) -> Result<Option<Backup>, AppError> {
        validate_filename(filename)?;
        let mut conn = self.pool.acquire().await?;
        fetch_backup(&mut conn, filename).await
    }

    /// Write the backup's documents back. Fields that were absent when the
    /// backup was taken leave the current document untouched. No backup is
    /// taken of the state being replaced.
    pub async fn restore(&self, filename: &str) -> Result<(), AppError> {
        validate_filename(filename)?;

        let _guard = self.lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let backup = fetch_backup(&mut tx, filename)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Backup {} not found", filename)))?;

        if let Some(settings) = &backup.settings {
            write_document(&mut tx, DocumentKey::Settings, settings).await?;
        }
        if let Some(appdata) = &backup.appdata {
            write_document(&mut tx, DocumentKey::AppData, appdata).await?;
        }

        tx.commit().await?;

        tracing::info!(
            backup = %filename,
            settings = backup.settings.is_some(),
            appdata = backup.appdata.is_some(),
            "Restored backup"
        );
        Ok(())
    }
}

/// Whether `name` follows the `backup-<timestamp>.json` convention.
pub fn is_valid_backup_filename(name: &str) -> bool {
    name.strip_prefix(BACKUP_PREFIX)
        .and_then(|rest| rest.strip_suffix(BACKUP_SUFFIX))
        .map(|stamp| {
            !stamp.is_empty() && stamp.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        .unwrap_or(false)
}

fn validate_filename(name: &str) -> Result<(), AppError> {
    if is_valid_backup_filename(name) {
        Ok(())
    } else {
        Err(AppError::InvalidArgument(format!(
            "Invalid backup filename: {}",
            name
        )))
    }
}

/// Filename for a backup taken at `at`.
pub fn backup_filename(at: DateTime<Utc>) -> String {
    format!(
        "{}{}{}",
        BACKUP_PREFIX,
        at.format(FILENAME_TIME_FORMAT),
        BACKUP_SUFFIX
    )
}

/// A stored JSON null counts as absent.
fn snapshot(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

/// Current time, bumped past the newest backup so filenames stay unique and
/// strictly increasing even within one clock tick.
async fn next_backup_time(conn: &mut SqliteConnection) -> Result<DateTime<Utc>, AppError> {
    let now = Utc::now();
    let latest: Option<String> =
        sqlx::query_scalar("SELECT created FROM backups ORDER BY created DESC LIMIT 1")
            .fetch_optional(&mut *conn)
            .await?;

    let latest = latest
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc));

    Ok(match latest {
        Some(latest) if latest >= now => latest + Duration::microseconds(1),
        _ => now,
    })
}

async fn fetch_backup(
    conn: &mut SqliteConnection,
    filename: &str,
) -> Result<Option<Backup>, AppError> {
    let row = sqlx::query("SELECT filename, settings, appdata, created FROM backups WHERE filename = ?")
        .bind(filename)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let settings: Option<String> = row.get("settings");
    let appdata: Option<String> = row.get("appdata");

    Ok(Some(Backup {
        filename: row.get("filename"),
        settings: settings.map(|s| serde_json::from_str(&s)).transpose()?,
        appdata: appdata.map(|s| serde_json::from_str(&s)).transpose()?,
        created: row.get("created"),
    }))
}

//! Document store: whole-replace JSON values by key.

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{BackupManager, WriteLock};
use crate::errors::AppError;
use crate::models::DocumentKey;

/// Key to JSON document persistence with upsert semantics.
#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
    backups: BackupManager,
    lock: WriteLock,
}

impl DocumentStore {
    /// The store shares the backup manager's write lock so that
    /// backup-then-write runs as one critical section.
    pub fn new(pool: SqlitePool, backups: BackupManager) -> Self {
        let lock = backups.write_lock();
        Self { pool, backups, lock }
    }

    /// Current value of a document; never-written documents are `None`.
    pub async fn get(&self, key: DocumentKey) -> Result<Option<Value>, AppError> {
        let mut conn = self.pool.acquire().await?;
        read_document(&mut conn, key).await
    }

    /// Replace a document without taking a backup.
    #[cfg(test)]
    pub async fn set(&self, key: DocumentKey, value: &Value) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let mut conn = self.pool.acquire().await?;
        write_document(&mut conn, key, value).await
    }

    /// Snapshot the current documents into the backup log, then replace `key`.
    ///
    /// Both steps commit together; a failure in either leaves nothing behind.
    pub async fn save(&self, key: DocumentKey, value: &Value) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let mut tx = self.pool.begin().await?;

        self.backups.create_in(&mut tx).await?;
        write_document(&mut tx, key, value).await?;

        tx.commit().await?;
        tracing::debug!(document = key.as_str(), "Saved document");
        Ok(())
    }
}

/// Read a document on an existing connection.
pub(crate) async fn read_document(
    conn: &mut SqliteConnection,
    key: DocumentKey,
) -> Result<Option<Value>, AppError> {
    let row = sqlx::query("SELECT value FROM documents WHERE key = ?")
        .bind(key.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let raw: String = row.get("value");
            Ok(Some(serde_json::from_str(&raw)?))
        }
        None => Ok(None),
    }
}

/// Upsert a document on an existing connection. One statement, so readers
/// see either the old or the new value.
pub(crate) async fn write_document(
    conn: &mut SqliteConnection,
    key: DocumentKey,
    value: &Value,
) -> Result<(), AppError> {
    let raw = serde_json::to_string(value)?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO documents (key, value, updated_at) VALUES (?, ?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key.as_str())
    .bind(&raw)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

//! Update feed: newest-first staff updates with optional photos.

use chrono::{SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::ids;
use crate::models::{NewUpdate, PhotoUpload, Update};
use crate::storage::PhotoStore;

/// Ordered collection of update records.
#[derive(Clone)]
pub struct UpdateFeed {
    pool: SqlitePool,
    photos: PhotoStore,
}

impl UpdateFeed {
    pub fn new(pool: SqlitePool, photos: PhotoStore) -> Self {
        Self { pool, photos }
    }

    /// All updates, newest first.
    pub async fn list(&self) -> Result<Vec<Update>, AppError> {
        let rows = sqlx::query(
            "SELECT id, staff, message, type, day, photo, timestamp FROM updates ORDER BY seq DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(update_from_row).collect())
    }

    /// Get an update by ID.
    pub async fn get(&self, id: &str) -> Result<Option<Update>, AppError> {
        let row = sqlx::query(
            "SELECT id, staff, message, type, day, photo, timestamp FROM updates WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(update_from_row))
    }

    /// Create an update at the head of the feed.
    ///
    /// A photo that fails to store is logged and dropped; the update is
    /// still created, without a photo.
    pub async fn insert(
        &self,
        fields: &NewUpdate,
        photo: Option<PhotoUpload>,
    ) -> Result<Update, AppError> {
        let photo_name = match photo {
            Some(upload) => match self
                .photos
                .store(upload.bytes, upload.original_name.as_deref())
                .await
            {
                Ok(name) => Some(name),
                Err(e) => {
                    tracing::warn!("Failed to store photo, creating update without it: {}", e);
                    None
                }
            },
            None => None,
        };

        let update = Update {
            id: ids::update_id(),
            staff: fields.staff(),
            message: fields.message(),
            kind: fields.kind(),
            day: fields.day(),
            photo: photo_name,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        let result = sqlx::query(
            "INSERT INTO updates (id, staff, message, type, day, photo, timestamp) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&update.id)
        .bind(&update.staff)
        .bind(&update.message)
        .bind(&update.kind)
        .bind(update.day)
        .bind(&update.photo)
        .bind(&update.timestamp)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            // Don't leave an orphaned photo behind
            if let Some(name) = &update.photo {
                self.remove_photo(name).await;
            }
            return Err(e.into());
        }

        tracing::info!(
            update = %update.id,
            staff = %update.staff,
            photo = update.photo.is_some(),
            "Created update"
        );
        Ok(update)
    }

    /// Remove an update and its photo. Unknown ids are a no-op.
    pub async fn delete_by_id(&self, id: &str) -> Result<(), AppError> {
        let Some(update) = self.get(id).await? else {
            tracing::debug!(update = %id, "Delete of unknown update ignored");
            return Ok(());
        };

        if let Some(name) = &update.photo {
            self.remove_photo(name).await;
        }

        sqlx::query("DELETE FROM updates WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::info!(update = %id, "Deleted update");
        Ok(())
    }

    /// Best-effort photo cleanup.
    async fn remove_photo(&self, name: &str) {
        if let Err(e) = self.photos.delete(name).await {
            tracing::warn!(photo = %name, "Failed to delete photo: {}", e);
        }
    }
}

fn update_from_row(row: &sqlx::sqlite::SqliteRow) -> Update {
    Update {
        id: row.get("id"),
        staff: row.get("staff"),
        message: row.get("message"),
        kind: row.get("type"),
        day: row.get("day"),
        photo: row.get("photo"),
        timestamp: row.get("timestamp"),
    }
}

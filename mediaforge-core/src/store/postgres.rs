use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediaforge_model::{ResizeMethod, ThumbnailRecord};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{StoreError, ThumbnailStore};

/// Postgres-backed thumbnail index. Schema lives in `migrations/`; run
/// [`crate::MIGRATOR`] against the pool before first use.
#[derive(Debug, Clone)]
pub struct PostgresThumbnailStore {
    pool: PgPool,
}

impl PostgresThumbnailStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<ThumbnailRecord, StoreError> {
        let origin: String = row
            .try_get("origin")
            .map_err(|e| StoreError::Query(format!("failed to read origin: {e}")))?;
        let media_id: String = row
            .try_get("media_id")
            .map_err(|e| StoreError::Query(format!("failed to read media_id: {e}")))?;
        let width: i32 = row
            .try_get("width")
            .map_err(|e| StoreError::Query(format!("failed to read width: {e}")))?;
        let height: i32 = row
            .try_get("height")
            .map_err(|e| StoreError::Query(format!("failed to read height: {e}")))?;
        let method: String = row
            .try_get("method")
            .map_err(|e| StoreError::Query(format!("failed to read method: {e}")))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| StoreError::Query(format!("failed to read created_at: {e}")))?;
        let content_type: String = row
            .try_get("content_type")
            .map_err(|e| StoreError::Query(format!("failed to read content_type: {e}")))?;
        let location: String = row
            .try_get("location")
            .map_err(|e| StoreError::Query(format!("failed to read location: {e}")))?;
        let size_bytes: i64 = row
            .try_get("size_bytes")
            .map_err(|e| StoreError::Query(format!("failed to read size_bytes: {e}")))?;

        let method = method.parse::<ResizeMethod>().map_err(|e| {
            StoreError::Query(format!("stored method is invalid: {e}"))
        })?;

        Ok(ThumbnailRecord {
            origin,
            media_id,
            width: width as u32,
            height: height as u32,
            method,
            created_at,
            content_type,
            location: PathBuf::from(location),
            size_bytes: size_bytes as u64,
        })
    }
}

#[async_trait]
impl ThumbnailStore for PostgresThumbnailStore {
    async fn get(
        &self,
        origin: &str,
        media_id: &str,
        width: u32,
        height: u32,
        method: ResizeMethod,
    ) -> Result<Option<ThumbnailRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT origin, media_id, width, height, method, created_at,
                   content_type, location, size_bytes
            FROM thumbnails
            WHERE origin = $1
              AND media_id = $2
              AND width = $3
              AND height = $4
              AND method = $5
            "#,
        )
        .bind(origin)
        .bind(media_id)
        .bind(width as i32)
        .bind(height as i32)
        .bind(method.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn insert(&self, record: &ThumbnailRecord) -> Result<(), StoreError> {
        // Records are write-once; a concurrent duplicate keeps the first row.
        sqlx::query(
            r#"
            INSERT INTO thumbnails (
                origin, media_id, width, height, method,
                created_at, content_type, location, size_bytes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (origin, media_id, width, height, method) DO NOTHING
            "#,
        )
        .bind(&record.origin)
        .bind(&record.media_id)
        .bind(record.width as i32)
        .bind(record.height as i32)
        .bind(record.method.as_str())
        .bind(record.created_at)
        .bind(&record.content_type)
        .bind(record.location.to_string_lossy().as_ref())
        .bind(record.size_bytes as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

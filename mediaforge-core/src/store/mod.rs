//! Durable persistence port for generated thumbnails.

use async_trait::async_trait;
use mediaforge_model::{ResizeMethod, ThumbnailRecord};
use thiserror::Error;

mod memory;
pub use memory::MemoryThumbnailStore;

#[cfg(feature = "database")]
mod postgres;
#[cfg(feature = "database")]
pub use postgres::PostgresThumbnailStore;

/// Store failures. "Not found" is not an error; `get` expresses it as
/// `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("thumbnail store query failed: {0}")]
    Query(String),

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Index of persisted thumbnails, keyed by
/// `(origin, media_id, width, height, method)`.
///
/// Records are write-once: a second insert for the same key must leave the
/// existing record untouched and succeed.
#[async_trait]
pub trait ThumbnailStore: Send + Sync + 'static {
    async fn get(
        &self,
        origin: &str,
        media_id: &str,
        width: u32,
        height: u32,
        method: ResizeMethod,
    ) -> Result<Option<ThumbnailRecord>, StoreError>;

    async fn insert(&self, record: &ThumbnailRecord) -> Result<(), StoreError>;
}

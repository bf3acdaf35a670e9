use std::collections::HashMap;

use async_trait::async_trait;
use mediaforge_model::{ResizeMethod, ThumbnailRecord};
use tokio::sync::Mutex;

use super::{StoreError, ThumbnailStore};

type Key = (String, String, u32, u32, ResizeMethod);

/// In-memory store used by tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryThumbnailStore {
    records: Mutex<HashMap<Key, ThumbnailRecord>>,
}

impl MemoryThumbnailStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl ThumbnailStore for MemoryThumbnailStore {
    async fn get(
        &self,
        origin: &str,
        media_id: &str,
        width: u32,
        height: u32,
        method: ResizeMethod,
    ) -> Result<Option<ThumbnailRecord>, StoreError> {
        let records = self.records.lock().await;
        let key = (
            origin.to_string(),
            media_id.to_string(),
            width,
            height,
            method,
        );
        Ok(records.get(&key).cloned())
    }

    async fn insert(&self, record: &ThumbnailRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let key = (
            record.origin.clone(),
            record.media_id.clone(),
            record.width,
            record.height,
            record.method,
        );
        // Write-once: the first record for a key wins.
        records.entry(key).or_insert_with(|| record.clone());
        Ok(())
    }
}

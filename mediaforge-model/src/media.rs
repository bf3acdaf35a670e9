use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Descriptor for a stored media item that derived artifacts are computed
/// from. `origin` plus `media_id` form the logical identity of the item;
/// `location` points at the source bytes on disk and is only read by
/// generation routines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub origin: String,
    pub media_id: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub location: PathBuf,
}

impl MediaDescriptor {
    /// The `origin/media_id` pair as a single display key.
    pub fn identity(&self) -> String {
        format!("{}/{}", self.origin, self.media_id)
    }
}

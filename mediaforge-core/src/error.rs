use mediaforge_model::ThumbnailRecord;
use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by thumbnail resolution.
///
/// `Clone` so a single outcome can be broadcast to every coalesced waiter.
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// Caller bug (bad dimensions or method); never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The media cannot be thumbnailed, either because the format is not
    /// thumbnail-capable or because it is not in the configured allow-list.
    /// Permanent for a given media item.
    #[error("cannot generate thumbnail for content type {content_type}")]
    UnsupportedContentType { content_type: String },

    /// The source exceeds the configured byte cap. Distinct from
    /// `UnsupportedContentType` so callers can react to policy changes.
    #[error("media too large to thumbnail ({size_bytes} bytes, limit {max_bytes})")]
    MediaTooLarge { size_bytes: u64, max_bytes: u64 },

    /// The durable store failed in a way other than "not found".
    #[error("thumbnail storage error: {0}")]
    Storage(String),

    /// Generation succeeded but the index write failed. The carried record
    /// is usable now but not guaranteed durable.
    #[error("thumbnail generated but not persisted: {message}")]
    StoreInsert {
        record: Box<ThumbnailRecord>,
        message: String,
    },

    /// The coalescing engine shut down before this request's work ran.
    #[error("thumbnail resolution interrupted by shutdown")]
    Interrupted,
}

impl From<StoreError> for ResolveError {
    fn from(err: StoreError) -> Self {
        ResolveError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;

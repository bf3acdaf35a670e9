//! Thumbnail generation port.
//!
//! Rendering strategy is pluggable; the resolver only needs something that
//! turns a media descriptor plus target dimensions into an artifact on disk.

use async_trait::async_trait;
use mediaforge_model::{GeneratedThumbnail, MediaDescriptor, ResizeMethod};
use thiserror::Error;

#[cfg(feature = "imaging")]
mod imaging;
#[cfg(feature = "imaging")]
pub use imaging::ImageThumbnailer;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("failed to read or write thumbnail data: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "imaging")]
    #[error("failed to decode or encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("generation task failed: {0}")]
    Task(String),
}

/// Produces a thumbnail artifact for `media` at exactly the given target
/// dimensions and method.
#[async_trait]
pub trait GenerateThumbnail: Send + Sync + 'static {
    async fn generate(
        &self,
        media: &MediaDescriptor,
        width: u32,
        height: u32,
        method: ResizeMethod,
    ) -> Result<GeneratedThumbnail, GenerateError>;
}

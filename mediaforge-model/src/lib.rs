//! Core data model definitions shared across Mediaforge crates.
#![allow(missing_docs)]

pub mod error;
pub mod media;
pub mod thumbnail;

pub use error::{ModelError, Result as ModelResult};
pub use media::MediaDescriptor;
pub use thumbnail::{GeneratedThumbnail, ResizeMethod, ThumbnailRecord};

//! Core library for the Mediaforge media repository.
//!
//! Two tightly coupled pieces live here: a generic concurrent
//! resource-coalescing engine ([`resource`]) that computes identifier-keyed
//! work at most once under concurrent demand, and the thumbnail resolution
//! policy ([`thumbnail`]) that sizes, validates, caches, and persists
//! derived artifacts against a durable store.
#![allow(missing_docs)]

pub mod error;
pub mod generate;
pub mod resource;
pub mod store;
pub mod thumbnail;

pub use error::{ResolveError, Result};
pub use generate::{GenerateError, GenerateThumbnail};
#[cfg(feature = "imaging")]
pub use generate::ImageThumbnailer;
pub use resource::{
    BrokerError, BrokerOptions, FetchResource, ResourceBroker, WorkRequest,
};
pub use store::{MemoryThumbnailStore, StoreError, ThumbnailStore};
#[cfg(feature = "database")]
pub use store::PostgresThumbnailStore;
pub use thumbnail::{
    CoalescedThumbnails, ThumbnailOutcome, ThumbnailService,
};

/// Embedded schema migrations for the Postgres-backed store.
#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

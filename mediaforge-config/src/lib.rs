//! Shared configuration library for Mediaforge.
//!
//! This crate centralizes config defaults, loading, and validation so the
//! core library and any embedding surface agree on a single source of truth
//! for thumbnail sizing policy and resource-pool tuning.

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::ConfigSource;
pub use models::{
    CacheConfig, Config, ResourceBrokerConfig, ThumbnailSize, ThumbnailsConfig,
};
pub use validation::{ConfigWarning, ConfigWarnings};

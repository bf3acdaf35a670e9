use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level Mediaforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub thumbnails: ThumbnailsConfig,
    pub resources: ResourceBrokerConfig,
}

impl Config {
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        self.cache.ensure_directories()
    }

    pub fn thumbnail_cache_dir(&self) -> &Path {
        &self.cache.thumbnails
    }
}

/// On-disk locations for generated artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub root: PathBuf,
    pub thumbnails: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("cache"),
            thumbnails: PathBuf::from("cache/thumbnails"),
        }
    }
}

impl CacheConfig {
    fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.thumbnails)?;
        Ok(())
    }
}

/// A configured thumbnail size candidate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Thumbnail sizing policy: which target dimensions may be produced, which
/// content types are eligible, and how large a source may be.
///
/// `sizes` is ordered; requested dimensions are matched against candidates
/// in this order and the last entry doubles as the fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailsConfig {
    pub sizes: Vec<ThumbnailSize>,
    pub types: Vec<String>,
    pub max_source_bytes: u64,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            sizes: vec![
                ThumbnailSize::new(32, 32),
                ThumbnailSize::new(96, 96),
                ThumbnailSize::new(320, 240),
                ThumbnailSize::new(640, 480),
                ThumbnailSize::new(800, 600),
            ],
            types: vec![
                "image/jpeg".to_string(),
                "image/jpg".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
            ],
            // 10 MiB source cap
            max_source_bytes: 10_485_760,
        }
    }
}

/// Tuning for the resource coalescing engine. `workers` bounds how many
/// expensive computations run at once; completed results live for
/// `result_ttl_secs` before callers re-derive, and the sweep reclaims
/// memory every `sweep_interval_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBrokerConfig {
    pub workers: usize,
    pub result_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub queue_depth: usize,
}

impl Default for ResourceBrokerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            result_ttl_secs: 60,
            sweep_interval_secs: 300,
            queue_depth: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        assert!(!config.thumbnails.sizes.is_empty());
        assert!(config.thumbnails.types.contains(&"image/png".to_string()));
        assert!(config.resources.workers >= 1);
        assert_eq!(config.thumbnails.max_source_bytes, 10_485_760);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [thumbnails]
            max_source_bytes = 1024

            [[thumbnails.sizes]]
            width = 64
            height = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.thumbnails.max_source_bytes, 1024);
        assert_eq!(
            config.thumbnails.sizes,
            vec![ThumbnailSize::new(64, 64)]
        );
        // Untouched sections keep their defaults.
        assert_eq!(config.resources.workers, 4);
        assert_eq!(config.cache.root, PathBuf::from("cache"));
    }
}

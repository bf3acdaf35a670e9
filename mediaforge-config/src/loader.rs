use std::{env, fs, path::{Path, PathBuf}};

use anyhow::{Context, anyhow};
use tracing::debug;

use crate::models::Config;

/// Source that produced the loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

const ENV_CONFIG_PATH: &str = "MEDIAFORGE_CONFIG_PATH";
const ENV_CONFIG_JSON: &str = "MEDIAFORGE_CONFIG_JSON";
const DEFAULT_FILE: &str = "mediaforge.toml";

impl Config {
    /// Load configuration overrides using environment variables.
    /// Evaluation order:
    /// 1) `$MEDIAFORGE_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$MEDIAFORGE_CONFIG_JSON` (inline JSON),
    /// 3) `mediaforge.toml` in the working directory,
    /// 4) defaults if none of the above is set.
    pub fn load_from_env() -> anyhow::Result<(Self, ConfigSource)> {
        if let Ok(path_str) = env::var(ENV_CONFIG_PATH)
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var(ENV_CONFIG_JSON)
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .with_context(|| format!("failed to parse {ENV_CONFIG_JSON}"))?;
            return Ok((parsed, ConfigSource::EnvInline));
        }

        let default_file = Path::new(DEFAULT_FILE);
        if default_file.is_file() {
            let config = Self::load_from_file(default_file)?;
            return Ok((config, ConfigSource::File(default_file.to_path_buf())));
        }

        debug!("no configuration source found, using defaults");
        Ok((Self::default(), ConfigSource::Default))
    }

    /// Parse a config file, selecting the format by extension (`.json` is
    /// JSON, anything else is treated as TOML).
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| {
            format!("failed to read config file {}", path.display())
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::parse_json(&raw).with_context(|| {
                format!("failed to parse JSON config {}", path.display())
            })
        } else {
            toml::from_str(&raw).map_err(|err| {
                anyhow!("failed to parse TOML config {}: {err}", path.display())
            })
        }
    }

    fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).map_err(|err| anyhow!(err))
    }
}

use std::fmt::{self, Display};

use crate::models::Config;

/// A non-fatal configuration problem worth surfacing at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No thumbnail sizes configured; every request resolves to its raw
    /// dimensions and nothing bounds artifact proliferation.
    EmptySizeList,
    /// No content types allowed; every generation request will be rejected.
    EmptyTypeList,
    /// The engine cannot be constructed with zero workers.
    ZeroWorkers,
    /// A result TTL of zero makes every completed result expire immediately.
    ZeroResultTtl,
}

impl Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::EmptySizeList => {
                write!(f, "thumbnails.sizes is empty; requested dimensions will be used verbatim")
            }
            ConfigWarning::EmptyTypeList => {
                write!(f, "thumbnails.types is empty; all thumbnail generation will be rejected")
            }
            ConfigWarning::ZeroWorkers => {
                write!(f, "resources.workers is 0; the resource broker will refuse to start")
            }
            ConfigWarning::ZeroResultTtl => {
                write!(f, "resources.result_ttl_secs is 0; completed results expire immediately")
            }
        }
    }
}

/// All warnings produced by validating one configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings(Vec<ConfigWarning>);

impl ConfigWarnings {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.0.iter()
    }

    /// Emit every warning through tracing at warn level.
    pub fn log(&self) {
        for warning in &self.0 {
            tracing::warn!("config: {warning}");
        }
    }
}

impl Config {
    /// Check for configurations that will load but behave surprisingly.
    pub fn validate(&self) -> ConfigWarnings {
        let mut warnings = Vec::new();

        if self.thumbnails.sizes.is_empty() {
            warnings.push(ConfigWarning::EmptySizeList);
        }
        if self.thumbnails.types.is_empty() {
            warnings.push(ConfigWarning::EmptyTypeList);
        }
        if self.resources.workers == 0 {
            warnings.push(ConfigWarning::ZeroWorkers);
        }
        if self.resources.result_ttl_secs == 0 {
            warnings.push(ConfigWarning::ZeroResultTtl);
        }

        ConfigWarnings(warnings)
    }
}

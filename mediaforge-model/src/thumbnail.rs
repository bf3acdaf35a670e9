use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// How a source image is fitted into the target dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    /// Fill the target box exactly, trimming overflow.
    Crop,
    /// Fit within the target box, preserving aspect ratio.
    Scale,
}

impl ResizeMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResizeMethod::Crop => "crop",
            ResizeMethod::Scale => "scale",
        }
    }
}

impl Display for ResizeMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResizeMethod {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crop" => Ok(ResizeMethod::Crop),
            "scale" => Ok(ResizeMethod::Scale),
            other => Err(ModelError::InvalidMethod(other.to_string())),
        }
    }
}

/// A persisted thumbnail. Uniquely identified by
/// `(origin, media_id, width, height, method)` and immutable once stored;
/// `width`/`height` are always the canonical target dimensions, which may
/// differ from what a caller originally requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRecord {
    pub origin: String,
    pub media_id: String,
    pub width: u32,
    pub height: u32,
    pub method: ResizeMethod,
    pub created_at: DateTime<Utc>,
    pub content_type: String,
    pub location: PathBuf,
    pub size_bytes: u64,
}

/// What a generation routine hands back after writing a new artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedThumbnail {
    pub content_type: String,
    pub location: PathBuf,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_method_string_round_trip() {
        for method in [ResizeMethod::Crop, ResizeMethod::Scale] {
            assert_eq!(method.as_str().parse::<ResizeMethod>().unwrap(), method);
        }
    }

    #[test]
    fn resize_method_rejects_unknown_strings() {
        let err = "stretch".parse::<ResizeMethod>().unwrap_err();
        assert!(err.to_string().contains("stretch"));
    }
}

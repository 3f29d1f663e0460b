//! Plugin options.
//!
//! Options are deserialized from an optional `respimg.toml`; every field
//! has a default so an absent file means default behavior.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Root options structure for the plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Display width assumed when a request uses density descriptors
    /// without its own `displayWidth` parameter.
    pub display_width: u32,

    /// Encoder tuning
    pub encoder: EncoderConfig,

    /// Input guards
    pub limits: LimitsConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            display_width: 1024,
            encoder: EncoderConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self { jpeg_quality: 80 }
    }
}

/// Resource limits to protect the build against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum source file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum source dimension (width or height)
    pub max_source_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_source_dimension: 10000,
        }
    }
}

impl Options {
    /// Load options from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let options: Options = toml::from_str(&content)?;
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.display_width == 0 {
            return Err(ConfigError::ValidationError(
                "display_width must be positive".to_string(),
            ));
        }
        if !(1..=100).contains(&self.encoder.jpeg_quality) {
            return Err(ConfigError::ValidationError(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.encoder.jpeg_quality
            )));
        }
        Ok(())
    }
}

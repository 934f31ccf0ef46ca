//! Configuration persistence for the `seamless` binary.
//!
//! Configuration is resolved with the following priority:
//! 1. CLI arguments (highest priority)
//! 2. Config file (`--config`, or ~/.config/seamless-tiling/config.toml)
//! 3. Default values (lowest priority)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use seamless_core::{SeamlessTilingPatch, TilingMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_STEPS: usize = 20;
pub const DEFAULT_CHANNELS: usize = 4;
pub const DEFAULT_LATENT_SIZE: usize = 32;

/// Persistent configuration stored in TOML format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// First step with circular padding; negative means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_step: Option<i64>,

    /// Last step with circular padding; negative means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_step: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_x: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_y: Option<bool>,

    /// Decoder tiling mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiling: Option<TilingMode>,

    /// Number of denoising iterations to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latent_height: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latent_width: Option<usize>,

    /// Latent channel count of the demo networks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<usize>,
}

impl CliConfig {
    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("seamless-tiling").join("config.toml"))
    }

    /// Load configuration from the default path, or defaults if absent.
    pub fn load() -> Self {
        Self::default_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default()
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from `path`, or defaults if the file does not exist
    /// yet. Unreadable or malformed files are still errors.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_from(path) {
            Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            other => other,
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Merge with another config, preferring values from `other`.
    pub fn merge(&mut self, other: &CliConfig) {
        if other.start_step.is_some() {
            self.start_step = other.start_step;
        }
        if other.stop_step.is_some() {
            self.stop_step = other.stop_step;
        }
        if other.tile_x.is_some() {
            self.tile_x = other.tile_x;
        }
        if other.tile_y.is_some() {
            self.tile_y = other.tile_y;
        }
        if other.tiling.is_some() {
            self.tiling = other.tiling;
        }
        if other.steps.is_some() {
            self.steps = other.steps;
        }
        if other.latent_height.is_some() {
            self.latent_height = other.latent_height;
        }
        if other.latent_width.is_some() {
            self.latent_width = other.latent_width;
        }
        if other.channels.is_some() {
            self.channels = other.channels;
        }
    }

    /// The denoiser patch node, falling back to its defaults.
    pub fn patch_node(&self) -> SeamlessTilingPatch {
        let defaults = SeamlessTilingPatch::default();
        SeamlessTilingPatch {
            start_step: self.start_step.unwrap_or(defaults.start_step),
            stop_step: self.stop_step.unwrap_or(defaults.stop_step),
            tiling_x: self.tile_x.unwrap_or(defaults.tiling_x),
            tiling_y: self.tile_y.unwrap_or(defaults.tiling_y),
        }
    }

    pub fn tiling_mode(&self) -> TilingMode {
        self.tiling.unwrap_or_default()
    }

    pub fn steps(&self) -> usize {
        self.steps.unwrap_or(DEFAULT_STEPS)
    }

    pub fn channels(&self) -> usize {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// `(height, width)` of the latent grid.
    pub fn latent_size(&self) -> (usize, usize) {
        (
            self.latent_height.unwrap_or(DEFAULT_LATENT_SIZE),
            self.latent_width.unwrap_or(DEFAULT_LATENT_SIZE),
        )
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No config directory available")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = CliConfig {
            start_step: Some(-1),
            stop_step: Some(12),
            tile_x: Some(true),
            tiling: Some(TilingMode::XOnly),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = CliConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_tiling_mode_in_toml() {
        let config: CliConfig = toml::from_str("tiling = \"y_only\"\nsteps = 4\n").unwrap();
        assert_eq!(config.tiling_mode(), TilingMode::YOnly);
        assert_eq!(config.steps(), 4);
    }

    #[test]
    fn test_merge() {
        let mut base = CliConfig {
            start_step: Some(0),
            stop_step: Some(10),
            channels: Some(8),
            ..Default::default()
        };
        let overrides = CliConfig {
            stop_step: Some(-1),
            tile_y: Some(false),
            ..Default::default()
        };
        base.merge(&overrides);

        assert_eq!(base.start_step, Some(0));
        assert_eq!(base.stop_step, Some(-1));
        assert_eq!(base.tile_y, Some(false));
        assert_eq!(base.channels, Some(8));
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.patch_node(), SeamlessTilingPatch::default());
        assert_eq!(config.tiling_mode(), TilingMode::Enable);
        assert_eq!(config.steps(), DEFAULT_STEPS);
        assert_eq!(config.latent_size(), (DEFAULT_LATENT_SIZE, DEFAULT_LATENT_SIZE));
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempdir().unwrap();
        let err = CliConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_load_or_default_then_save_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("new.toml");

        let mut config = CliConfig::load_or_default(&path).unwrap();
        assert_eq!(config, CliConfig::default());

        config.tiling = Some(TilingMode::XOnly);
        config.save_to(&path).unwrap();
        let reloaded = CliConfig::load_or_default(&path).unwrap();
        assert_eq!(reloaded.tiling_mode(), TilingMode::XOnly);
    }

    #[test]
    fn test_load_or_default_keeps_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "steps = \"many\"\n").unwrap();
        assert!(matches!(CliConfig::load_or_default(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_invalid_tiling_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "tiling = \"diagonal\"\n").unwrap();
        assert!(matches!(CliConfig::load_from(&path), Err(ConfigError::Parse(_))));
    }
}

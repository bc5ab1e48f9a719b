//! Configuration management for camsource
//!
//! Provides configuration loading, saving, and validation for camera discovery,
//! resolution probing, and the create-camera-source dialog.

use crate::errors::CameraError;
use crate::types::WebcamDriver;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `CAMSOURCE__PROBING__WORKERS=4`
pub const ENV_PREFIX: &str = "CAMSOURCE";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CamSourceConfig {
    pub discovery: DiscoveryConfig,
    pub probing: ProbingConfig,
    pub dialog: DialogConfig,
}

/// Camera discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Discovery mechanism tried first
    pub preferred_driver: WebcamDriver,
    /// Highest device index the index prober tries (exclusive)
    pub max_probe_index: u32,
    /// Consecutive indexes that fail to open before the index prober stops
    pub max_consecutive_misses: u32,
}

/// Resolution probing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbingConfig {
    /// Resolution probes allowed to run at once
    pub workers: usize,
    /// How long camera selection waits for a resolution probe
    pub resolution_timeout_ms: u64,
    /// How long a caller waits for the deferred open-and-read test
    pub test_timeout_ms: u64,
}

/// Dialog presentation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Characters of a camera name shown in the camera list
    pub visible_name_chars: usize,
    /// Prefix of the suggested source name
    pub source_name_prefix: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            preferred_driver: WebcamDriver::Native,
            max_probe_index: 8,
            max_consecutive_misses: 2,
        }
    }
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            resolution_timeout_ms: 5000,
            test_timeout_ms: 10000,
        }
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            visible_name_chars: 22,
            source_name_prefix: "CameraSource".to_string(),
        }
    }
}

impl ProbingConfig {
    pub fn resolution_timeout(&self) -> Duration {
        Duration::from_millis(self.resolution_timeout_ms)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }
}

impl CamSourceConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: CamSourceConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the TOML file (optional) and apply `CAMSOURCE__SECTION__KEY` overrides
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        let layered = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default()).map_err(|e| {
                CameraError::ConfigError(format!("Failed to build default config: {}", e))
            })?)
            .add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CameraError::ConfigError(format!("Failed to load config: {}", e)))?;

        let config: CamSourceConfig = layered
            .try_deserialize()
            .map_err(|e| CameraError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate().map_err(CameraError::ConfigError)?;
        log::debug!("Layered configuration: {:?}", config);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::ConfigError(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("camsource.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_layered(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.discovery.max_probe_index == 0 || self.discovery.max_probe_index > 64 {
            return Err("Max probe index must be between 1 and 64".to_string());
        }
        if self.discovery.max_consecutive_misses == 0 {
            return Err("Max consecutive misses must be at least 1".to_string());
        }

        if self.probing.workers == 0 || self.probing.workers > 16 {
            return Err("Probe workers must be between 1 and 16".to_string());
        }
        if self.probing.resolution_timeout_ms == 0 {
            return Err("Resolution timeout must be greater than zero".to_string());
        }
        if self.probing.test_timeout_ms == 0 {
            return Err("Test timeout must be greater than zero".to_string());
        }

        if self.dialog.visible_name_chars == 0 {
            return Err("Visible name characters must be at least 1".to_string());
        }
        if self.dialog.source_name_prefix.trim().is_empty() {
            return Err("Source name prefix must not be blank".to_string());
        }

        Ok(())
    }
}

//! Configuration file support for hvclass.
//!
//! Settings are stored as JSON under the user config directory and supply
//! defaults that command-line flags override.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::ClassificationConfig;
use crate::constants::DEFAULT_TILE_ROWS;
use crate::context::RunContext;
use crate::rgb::PreviewStretch;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get all log levels in order from least to most verbose.
    pub fn all() -> &'static [LogLevel] {
        &[
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ]
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }

    /// Move `steps` levels towards Trace (positive) or Error (negative).
    pub fn shifted(self, steps: i32) -> Self {
        let all = Self::all();
        let current = all.iter().position(|l| *l == self).unwrap_or(2) as i32;
        let index = (current + steps).clamp(0, all.len() as i32 - 1);
        all[index as usize]
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Application name (for identification)
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Tiling and worker settings
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Classification defaults
    #[serde(default)]
    pub classification: ClassificationDefaults,

    /// PNG preview contrast stretch
    #[serde(default)]
    pub preview_stretch: PreviewStretch,
}

fn default_app_name() -> String {
    "hvclass".to_string()
}

/// Tiling and worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Rows read per tile
    #[serde(default = "default_tile_rows")]
    pub tile_rows: usize,

    /// Worker threads, 0 = one per core
    #[serde(default)]
    pub threads: usize,
}

fn default_tile_rows() -> usize {
    DEFAULT_TILE_ROWS
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            tile_rows: default_tile_rows(),
            threads: 0,
        }
    }
}

/// Classification defaults applied when the command line is silent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationDefaults {
    /// Similarity threshold
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Resample libraries onto the image axis
    #[serde(default)]
    pub resample_library: bool,
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            app_name: default_app_name(),
            log_level: LogLevel::default(),
            processing: ProcessingConfig::default(),
            classification: ClassificationDefaults::default(),
            preview_stretch: PreviewStretch::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.tile_rows == 0 {
            return Err(ConfigError::Invalid("tile_rows must be at least 1".to_string()));
        }
        self.classification_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.preview_stretch
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "hvclass-config.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("hvclass").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("hvclass")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from an explicit file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Save configuration to the default path.
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save(&path)
    }

    /// Run context carrying the configured tile size and worker count.
    pub fn run_context(&self) -> RunContext {
        RunContext::new()
            .with_tile_rows(self.processing.tile_rows)
            .with_threads(self.processing.threads)
    }

    /// Classification options seeded from the configured defaults.
    pub fn classification_config(&self) -> ClassificationConfig {
        ClassificationConfig {
            threshold: self.classification.threshold,
            class_names: None,
            resample_library: self.classification.resample_library,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A setting is out of range
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

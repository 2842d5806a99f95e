//! Configuration file support for the annotator.
//!
//! Settings are stored as JSON. Every section falls back to its defaults
//! when missing, so partial files written by older versions still load.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_UNDO_MEMORY, DEFAULT_MAX_UNDOS, DEFAULT_READ_CHUNK_SIZE, DEFAULT_WRITE_BUFFER_SIZE, MAX_BRUSH_SIZE,
    MAX_SPOTLIGHT_SIZE,
};
use crate::tools::ToolSettings;
use crate::undo::{RetentionPolicy, UndoConfig};

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
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Annotator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Log verbosity level
    pub log_level: LogLevel,

    pub undo: UndoSettings,

    pub tools: ToolSettings,

    pub io: IoSettings,
}

/// Undo history limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoSettings {
    /// Cap the number of undo steps instead of their estimated memory
    pub use_static_limit: bool,
    pub max_undos: i64,
    /// Bytes
    pub max_undo_memory: i64,
}

impl Default for UndoSettings {
    fn default() -> Self {
        Self {
            use_static_limit: false,
            max_undos: DEFAULT_MAX_UNDOS as i64,
            max_undo_memory: DEFAULT_MAX_UNDO_MEMORY as i64,
        }
    }
}

/// Annotation file reader and writer buffer sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSettings {
    pub read_chunk_size: usize,
    pub write_buffer_size: usize,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
        }
    }
}

impl AnnotatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            log_level: LogLevel::default(),
            undo: UndoSettings::default(),
            tools: ToolSettings::default(),
            io: IoSettings::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize and validate configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.undo.max_undos < 0 {
            return Err(ConfigError::invalid("undo.max_undos", "must not be negative"));
        }
        if self.undo.max_undo_memory < 0 {
            return Err(ConfigError::invalid("undo.max_undo_memory", "must not be negative"));
        }
        check_size("tools.brush_size", self.tools.brush_size, MAX_BRUSH_SIZE)?;
        check_size("tools.spotlight_size", self.tools.spotlight_size, MAX_SPOTLIGHT_SIZE)?;
        if !self.tools.spotlight_raycast_threshold.is_finite() || self.tools.spotlight_raycast_threshold < 0.0 {
            return Err(ConfigError::invalid(
                "tools.spotlight_raycast_threshold",
                "must be a finite, non-negative distance",
            ));
        }
        if self.io.read_chunk_size == 0 {
            return Err(ConfigError::invalid("io.read_chunk_size", "must be at least 1"));
        }
        if self.io.write_buffer_size == 0 {
            return Err(ConfigError::invalid("io.write_buffer_size", "must be at least 1"));
        }
        Ok(())
    }

    /// Undo manager configuration. Negative limits clamp to zero.
    pub fn to_undo_config(&self) -> UndoConfig {
        UndoConfig {
            policy: if self.undo.use_static_limit {
                RetentionPolicy::Static
            } else {
                RetentionPolicy::Memory
            },
            max_undos: usize::try_from(self.undo.max_undos).unwrap_or(0),
            max_undo_memory: usize::try_from(self.undo.max_undo_memory).unwrap_or(0),
        }
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "anno3d-config.json"
    }

    /// Get the default config file path.
    /// Returns None on WASM (no filesystem access).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("anno3d").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("anno3d")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from a file.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    #[cfg(not(target_arch = "wasm32"))]
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
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn check_size(field: &'static str, value: f32, max: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            message: format!("{} is outside [0, {}]", value, max),
        })
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

    /// A value parsed but is out of range
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, message: &str) -> Self {
        Self::InvalidValue {
            field,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::SelectionMode;

    #[test]
    fn test_defaults_roundtrip() {
        let config = AnnotatorConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(AnnotatorConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let config = AnnotatorConfig::from_json(r#"{"version": 1, "tools": {"selection_mode": "contain"}}"#).unwrap();
        assert_eq!(config.tools.selection_mode, SelectionMode::Contain);
        assert_eq!(config.tools.brush_size, ToolSettings::default().brush_size);
        assert_eq!(config.undo, UndoSettings::default());
        assert_eq!(config.io.read_chunk_size, DEFAULT_READ_CHUNK_SIZE);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("anno3d-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"version": 1, "log_level": "debug", "io": {"read_chunk_size": 64}}"#).unwrap();
        let loaded = AnnotatorConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.io.read_chunk_size, 64);
        assert!(matches!(
            AnnotatorConfig::load(&path),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let err = AnnotatorConfig::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::VersionTooNew {
                file_version: 99,
                supported_version: CONFIG_VERSION
            }
        ));
    }

    #[test]
    fn test_negative_limits_are_rejected() {
        let err = AnnotatorConfig::from_json(r#"{"undo": {"max_undos": -1}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "undo.max_undos", .. }));

        let err = AnnotatorConfig::from_json(r#"{"undo": {"max_undo_memory": -5}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "undo.max_undo_memory", .. }));
    }

    #[test]
    fn test_brush_size_out_of_range_is_rejected() {
        let mut config = AnnotatorConfig::default();
        config.tools.brush_size = MAX_BRUSH_SIZE + 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "tools.brush_size", .. })
        ));
        config.tools.brush_size = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_undo_config_conversion() {
        let mut config = AnnotatorConfig::default();
        assert_eq!(config.to_undo_config(), UndoConfig::default());

        config.undo.use_static_limit = true;
        config.undo.max_undos = 3;
        let undo = config.to_undo_config();
        assert_eq!(undo.policy, RetentionPolicy::Static);
        assert_eq!(undo.max_undos, 3);
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(LogLevel::Warn.to_level_filter(), log::LevelFilter::Warn);
        let level: LogLevel = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(level, LogLevel::Debug);
    }
}

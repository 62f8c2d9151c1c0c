//! Filesystem configuration
//!
//! Capacities are fixed for the lifetime of a filesystem instance. A config is
//! either built in code (usually from [`FsConfig::default`]) or parsed from JSON,
//! where every missing field falls back to its default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Capacity and logging configuration for one filesystem instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Size of one block in bytes
    pub block_size: usize,
    /// Number of blocks in the block store
    pub max_blocks: usize,
    /// Number of slots in the descriptor table (root included)
    pub max_descriptors: usize,
    /// Number of slots in the open-file table
    pub max_open_files: usize,
    /// Byte capacity preallocated for every new directory
    pub dir_default_size: usize,
    /// Number of log entries kept in memory
    pub log_capacity: usize,
    /// Entries below this level are dropped
    pub min_log_level: LogLevel,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            block_size: 64,
            max_blocks: 256,
            max_descriptors: 64,
            max_open_files: 64,
            dir_default_size: 512,
            log_capacity: 256,
            min_log_level: LogLevel::Info,
        }
    }
}

impl FsConfig {
    /// Parses a config from JSON text and validates it
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_json(&text)
    }

    /// Serializes the config as pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Checks that the capacities describe a usable filesystem
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::non_zero("block_size", self.block_size)?;
        Self::non_zero("max_blocks", self.max_blocks)?;
        Self::non_zero("max_descriptors", self.max_descriptors)?;
        Self::non_zero("max_open_files", self.max_open_files)?;

        // Every directory starts with "." and ".." records.
        let widest_id = (self.max_descriptors - 1).to_string().len();
        let seed_len = (".@/".len() + widest_id) + ("..@/".len() + widest_id);
        if self.dir_default_size < seed_len {
            return Err(ConfigError::Invalid {
                field: "dir_default_size",
                reason: format!("must be at least {} bytes", seed_len),
            });
        }

        let root_blocks = self.dir_default_size.div_ceil(self.block_size);
        if root_blocks > self.max_blocks {
            return Err(ConfigError::Invalid {
                field: "max_blocks",
                reason: format!("root directory alone needs {} blocks", root_blocks),
            });
        }

        Ok(())
    }

    fn non_zero(field: &'static str, value: usize) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = FsConfig::from_json(r#"{ "block_size": 16 }"#).unwrap();
        assert_eq!(config.block_size, 16);
        assert_eq!(config.max_blocks, FsConfig::default().max_blocks);
        assert_eq!(config.min_log_level, LogLevel::Info);
    }

    #[test]
    fn test_log_level_from_json() {
        let config = FsConfig::from_json(r#"{ "min_log_level": "debug" }"#).unwrap();
        assert_eq!(config.min_log_level, LogLevel::Debug);
    }

    #[test]
    fn test_malformed_json() {
        let result = FsConfig::from_json("{ block_size: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let result = FsConfig::from_json(r#"{ "block_size": 0 }"#);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "block_size",
                ..
            })
        ));
    }

    #[test]
    fn test_tiny_directory_rejected() {
        let config = FsConfig {
            dir_default_size: 4,
            ..FsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "dir_default_size",
                ..
            })
        ));
    }

    #[test]
    fn test_root_must_fit_in_block_store() {
        let config = FsConfig {
            block_size: 8,
            max_blocks: 2,
            ..FsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "max_blocks",
                ..
            })
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = FsConfig {
            block_size: 32,
            ..FsConfig::default()
        };
        let text = config.to_json().unwrap();
        assert_eq!(FsConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_descriptors": 8, "max_open_files": 4 }}"#).unwrap();

        let config = FsConfig::load(file.path()).unwrap();
        assert_eq!(config.max_descriptors, 8);
        assert_eq!(config.max_open_files, 4);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = FsConfig::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}

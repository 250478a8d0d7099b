//! Container configuration.
//!
//! A [`ContainerConfig`] fixes the chunk size used for both the in-memory
//! staging caches and the dataset growth increment, the maximum number of
//! signals a container may register, and the per-record flattened size
//! limit. The defaults match the values the recorder has always shipped
//! with; a JSON file can override any subset of them.
//!
//! ```json
//! { "chunk_size": 4096, "max_signals": 256 }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default number of records per chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 8192;

/// Default maximum number of signals per container.
pub const DEFAULT_MAX_SIGNALS: usize = 1024;

/// Default maximum flattened size (product of all dimensions) of a record.
pub const DEFAULT_MAX_FLAT_SIZE: usize = 2048;

/// Tunables for a [`Container`](crate::Container) and its signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfig {
    /// Records staged per signal before a bulk write; also the dataset
    /// growth increment.
    pub chunk_size: u64,

    /// Maximum number of signals the registry accepts.
    pub max_signals: usize,

    /// Maximum product of payload dimensions accepted at signal creation.
    pub max_flat_size: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_signals: DEFAULT_MAX_SIGNALS,
            max_flat_size: DEFAULT_MAX_FLAT_SIZE,
        }
    }
}

impl ContainerConfig {
    /// Loads a configuration from a JSON file and validates it.
    ///
    /// Fields missing from the file keep their default values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON for this type, and
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: Self = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if any limit is zero or the chunk
    /// size cannot be addressed in memory.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                reason: "chunk_size cannot be zero".to_string(),
            }
            .into());
        }

        if usize::try_from(self.chunk_size).is_err() {
            return Err(ConfigError::Invalid {
                reason: format!("chunk_size {} does not fit in memory", self.chunk_size),
            }
            .into());
        }

        if self.max_signals == 0 {
            return Err(ConfigError::Invalid {
                reason: "max_signals cannot be zero".to_string(),
            }
            .into());
        }

        if self.max_flat_size == 0 {
            return Err(ConfigError::Invalid {
                reason: "max_flat_size cannot be zero".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimDumpError;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.chunk_size, 8192);
        assert_eq!(config.max_signals, 1024);
        assert_eq!(config.max_flat_size, 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("simdump.json");
        fs::write(&path, r#"{ "chunk_size": 16 }"#).unwrap();

        let config = ContainerConfig::load(&path).unwrap();
        assert_eq!(config.chunk_size, 16);
        assert_eq!(config.max_signals, DEFAULT_MAX_SIGNALS);
        assert_eq!(config.max_flat_size, DEFAULT_MAX_FLAT_SIZE);
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("simdump.json");
        fs::write(&path, r#"{ "chunk": 16 }"#).unwrap();

        match ContainerConfig::load(&path).unwrap_err() {
            SimDumpError::Config(ConfigError::Parse { .. }) => {}
            other => panic!("Expected Parse error, got: {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = ContainerConfig::load(dir.path().join("absent.json"));
        assert!(matches!(
            result,
            Err(SimDumpError::Config(ConfigError::Read { .. }))
        ));
    }

    #[test]
    fn test_zero_values_rejected() {
        let zero_chunk = ContainerConfig {
            chunk_size: 0,
            ..ContainerConfig::default()
        };
        assert!(zero_chunk.validate().is_err());

        let zero_signals = ContainerConfig {
            max_signals: 0,
            ..ContainerConfig::default()
        };
        assert!(zero_signals.validate().is_err());

        let zero_flat = ContainerConfig {
            max_flat_size: 0,
            ..ContainerConfig::default()
        };
        assert!(zero_flat.validate().is_err());
    }
}

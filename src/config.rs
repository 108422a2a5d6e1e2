use serde::Deserialize;

use crate::error::{StorageError, StorageResult};

/// Runtime knobs for the storage core, sourced from environment variables
/// (prefix `SMALL_STORAGE_`). All fields have defaults, so an empty
/// environment produces a usable config.
///
/// Example: `SMALL_STORAGE_BUFFER_POOL_SIZE=64` overrides `buffer_pool_size`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Number of frames in the buffer pool.
    pub buffer_pool_size: usize,

    /// Path of the backing file the disk manager reads/writes.
    pub db_file: String,

    /// Maximum number of `(key, value)` pairs a leaf page holds before it
    /// splits.
    pub leaf_max_size: usize,

    /// Maximum number of `(key, child_page_id)` pairs an internal page
    /// holds before it splits.
    pub internal_max_size: usize,

    /// Whether the lock manager's cycle-detection background thread runs.
    pub enable_cycle_detection: bool,

    /// Sleep interval, in milliseconds, between cycle-detector sweeps.
    pub cycle_detection_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            buffer_pool_size: 128,
            db_file: "small_storage.db".to_string(),
            leaf_max_size: 4,
            internal_max_size: 4,
            enable_cycle_detection: false,
            cycle_detection_interval_ms: 50,
        }
    }
}

impl StorageConfig {
    /// Builds a config from the process environment, falling back to
    /// `StorageConfig::default()` for anything unset (the struct-level
    /// `#[serde(default)]` fills any field the environment source doesn't
    /// provide from `StorageConfig::default()`, so no base source is
    /// needed ahead of the environment one).
    pub fn from_env() -> StorageResult<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("SMALL_STORAGE"))
            .build()
            .map_err(|e| StorageError::InvariantViolation(e.to_string()))?;

        cfg.try_deserialize()
            .map_err(|e| StorageError::InvariantViolation(e.to_string()))
    }
}

impl From<config::ConfigError> for StorageError {
    fn from(e: config::ConfigError) -> Self {
        StorageError::InvariantViolation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = StorageConfig::default();
        assert!(cfg.buffer_pool_size > 0);
        assert!(!cfg.db_file.is_empty());
    }
}

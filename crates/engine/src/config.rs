// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datastore configuration

use holt_storage::{CorruptionPolicy, LogOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Options for opening a datastore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatastoreConfig {
    /// Datafile path; `None` keeps everything in memory
    pub filename: Option<PathBuf>,
    pub corruption: CorruptionPolicy,
    /// Compact once this many records have been appended
    pub compaction_threshold: Option<u64>,
    /// Compact periodically
    #[serde(with = "humantime_serde", default)]
    pub autocompaction_interval: Option<Duration>,
    /// Rewrite the datafile right after loading it
    pub compact_on_load: bool,
    /// Flush the datafile after every append
    pub sync_appends: bool,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            filename: None,
            corruption: CorruptionPolicy::default(),
            compaction_threshold: None,
            autocompaction_interval: None,
            compact_on_load: true,
            sync_appends: true,
        }
    }
}

impl DatastoreConfig {
    /// Memory-only datastore
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Datastore persisted at `path`
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_corruption(mut self, policy: CorruptionPolicy) -> Self {
        self.corruption = policy;
        self
    }

    pub fn with_compaction_threshold(mut self, records: u64) -> Self {
        self.compaction_threshold = Some(records);
        self
    }

    pub fn with_autocompaction_interval(mut self, interval: Duration) -> Self {
        self.autocompaction_interval = Some(interval);
        self
    }

    pub fn with_compact_on_load(mut self, enabled: bool) -> Self {
        self.compact_on_load = enabled;
        self
    }

    pub fn with_sync_appends(mut self, enabled: bool) -> Self {
        self.sync_appends = enabled;
        self
    }

    /// Parse configuration from TOML
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compaction_threshold == Some(0) {
            return Err(ConfigError::Invalid(
                "compaction_threshold must be at least 1".to_string(),
            ));
        }
        if self.autocompaction_interval == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid(
                "autocompaction_interval must be non-zero".to_string(),
            ));
        }
        if self
            .filename
            .as_deref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigError::Invalid("filename is empty".to_string()));
        }
        Ok(())
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            corruption: self.corruption,
            sync_appends: self.sync_appends,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

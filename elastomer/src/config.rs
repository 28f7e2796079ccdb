//! Archive configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for one archive
///
/// Every field has a default, so an empty YAML document is a valid
/// configuration:
///
/// ```yaml
/// name: ui-state
/// sequencer_thread: ui-state-seq
/// discard_redundant: true
/// slow_unit_threshold_ms: 50
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Name used in log lines
    #[serde(default = "default_name")]
    pub name: String,

    /// OS thread name of the sequencer
    #[serde(default = "default_sequencer_thread")]
    pub sequencer_thread: String,

    /// Whether `Archive::stage` drops writes equal to the stored value
    #[serde(default = "default_true")]
    pub discard_redundant: bool,

    /// Sequencer units running longer than this are logged. Zero disables.
    #[serde(default = "default_slow_unit_threshold_ms")]
    pub slow_unit_threshold_ms: u64,
}

fn default_name() -> String {
    String::from("archive")
}

fn default_sequencer_thread() -> String {
    String::from("elastomer-sequencer")
}

fn default_true() -> bool {
    true
}

fn default_slow_unit_threshold_ms() -> u64 {
    50
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            sequencer_thread: default_sequencer_thread(),
            discard_redundant: true,
            slow_unit_threshold_ms: default_slow_unit_threshold_ms(),
        }
    }
}

impl ArchiveConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty mapping
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ArchiveConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would otherwise fail later at thread spawn
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequencer_thread.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sequencer_thread must not be empty".to_string(),
            ));
        }
        if self.sequencer_thread.contains('\0') {
            return Err(ConfigError::Invalid(
                "sequencer_thread must not contain NUL bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder-style name override
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn slow_unit_threshold(&self) -> Option<Duration> {
        match self.slow_unit_threshold_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

//! Ingestion configuration
//!
//! Every field has a default, so an empty YAML document is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How a component interface token is matched against a vulnerability's interface field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Unanchored, case-sensitive substring of the raw field.
    /// `CAN` matches `CANBus-diag`.
    #[default]
    Substring,
    /// Exact equality with one of the field's tokens
    Token,
}

/// What to do when a system-model ID also appears as a vulnerability ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdCollisionPolicy {
    /// Abort before writing anything
    #[default]
    Reject,
    /// Log the colliding IDs and ingest anyway
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub interface_match: MatchMode,
    pub id_collision: IdCollisionPolicy,
    /// Retry `connects_to` references to rows that appear later in the sheet
    pub defer_forward_references: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interface_match: MatchMode::Substring,
            id_collision: IdCollisionPolicy::Reject,
            defer_forward_references: true,
        }
    }
}

impl IngestConfig {
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}

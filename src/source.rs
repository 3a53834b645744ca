//! Dataset loading
//!
//! A dataset file holds the two sheets of the workbook as arrays of row
//! objects keyed by the original column names:
//!
//! ```json
//! {
//!   "system_model":    [{"Type": "ECU", "ID": 1, "Name": "Gateway", "Interface": "CAN"}],
//!   "vulnerabilities": [{"ID": "V1", "Interface": "CAN,LIN", "CVSSv3": 7.5}]
//! }
//! ```
//!
//! JSON and YAML are accepted, picked by file extension.

use crate::ingest::Phase;
use crate::model::{
    RawSystemRow, RawVulnerabilityRow, RecordError, SystemModelRecord, VulnerabilityRecord,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON dataset: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML dataset: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Both sheets, untyped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDataset {
    pub system_model: Vec<RawSystemRow>,
    pub vulnerabilities: Vec<RawVulnerabilityRow>,
}

/// A row that failed conversion and will not be ingested
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub phase: Phase,
    pub row_index: usize,
    pub id: Option<String>,
    pub error: RecordError,
}

/// Both sheets, typed
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub system_model: Vec<SystemModelRecord>,
    pub vulnerabilities: Vec<VulnerabilityRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl Dataset {
    pub fn new(
        system_model: Vec<SystemModelRecord>,
        vulnerabilities: Vec<VulnerabilityRecord>,
    ) -> Self {
        Self {
            system_model,
            vulnerabilities,
            rejected: Vec::new(),
        }
    }

    /// Convert every raw row, collecting failures instead of stopping at the first
    pub fn from_raw(raw: RawDataset) -> Self {
        let mut dataset = Dataset::default();

        for (row_index, row) in raw.vulnerabilities.into_iter().enumerate() {
            let id = row.id_text();
            match row.into_record(row_index) {
                Ok(record) => dataset.vulnerabilities.push(record),
                Err(error) => dataset.reject(Phase::Vulnerabilities, row_index, id, error),
            }
        }

        for (row_index, row) in raw.system_model.into_iter().enumerate() {
            let id = row.id_text();
            match row.into_record(row_index) {
                Ok(record) => dataset.system_model.push(record),
                Err(error) => dataset.reject(Phase::SystemModel, row_index, id, error),
            }
        }

        dataset
    }

    fn reject(&mut self, phase: Phase, row_index: usize, id: Option<String>, error: RecordError) {
        warn!(%phase, row_index, id = ?id, %error, "row rejected at load");
        self.rejected.push(RejectedRow {
            phase,
            row_index,
            id,
            error,
        });
    }

    pub fn rejected_in(&self, phase: Phase) -> impl Iterator<Item = &RejectedRow> {
        self.rejected.iter().filter(move |row| row.phase == phase)
    }
}

/// Parse a dataset from JSON text
pub fn parse_json(text: &str) -> SourceResult<Dataset> {
    let raw: RawDataset = serde_json::from_str(text)?;
    Ok(Dataset::from_raw(raw))
}

/// Parse a dataset from YAML text
pub fn parse_yaml(text: &str) -> SourceResult<Dataset> {
    let raw: RawDataset = serde_yaml::from_str(text)?;
    Ok(Dataset::from_raw(raw))
}

/// Load a dataset file; `.json`, `.yaml` and `.yml` are supported
pub fn load_dataset(path: impl AsRef<Path>) -> SourceResult<Dataset> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let text = std::fs::read_to_string(path)?;
    let dataset = match extension.as_str() {
        "json" => parse_json(&text)?,
        "yaml" | "yml" => parse_yaml(&text)?,
        other => return Err(SourceError::UnsupportedFormat(other.to_string())),
    };

    info!(
        path = %path.display(),
        system_rows = dataset.system_model.len(),
        vulnerability_rows = dataset.vulnerabilities.len(),
        rejected = dataset.rejected.len(),
        "dataset loaded"
    );
    Ok(dataset)
}

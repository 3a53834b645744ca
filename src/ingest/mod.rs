//! Graph ingestion
//!
//! Two phases, run strictly in order:
//! 1. [`ingest_vulnerabilities`] writes one `Vulnerability` node per catalog row
//! 2. [`ingest_system_model`] writes one node per component, its `CONNECTS_TO`
//!    edges, and the `HAS_VULNERABILITY` edges inferred from its interfaces
//!
//! Each row is one transaction. Row-level failures are rolled back, recorded
//! in the phase report, and never stop the phase. Connection-level failures
//! abort the run with [`IngestError::Connection`].

pub mod inference;
pub mod labels;
pub mod orchestrator;
pub mod report;
pub mod system;
pub mod vulnerability;

pub use inference::{infer_vulnerability_links, interface_matches};
pub use labels::{resolve_label, UnknownNodeType, NODE_TYPE_TABLE};
pub use orchestrator::{Ingestor, RunState};
pub use report::{
    IngestReport, OutcomeKind, PhaseReport, RowDiagnostic, RowOutcome, SkipReason, UnresolvedEdge,
};
pub use system::{ingest_system_model, ComponentDirectory};
pub use vulnerability::ingest_vulnerabilities;

use crate::backend::{BackendError, BackendResult, GraphBackend};
use crate::graph::NodeKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Ingestion phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Vulnerabilities,
    SystemModel,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Vulnerabilities => "vulnerabilities",
            Phase::SystemModel => "system_model",
        })
    }
}

/// Run-level errors. Row-level problems never surface here.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Connection failure during {phase} phase: {source}")]
    Connection {
        phase: Phase,
        #[source]
        source: BackendError,
    },

    #[error("Failed to close {backend} backend: {source}")]
    Close {
        backend: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("IDs used by both system-model and vulnerability rows: {}", format_keys(.ids))]
    IdCollision { ids: Vec<NodeKey> },
}

pub type IngestResult<T> = Result<T, IngestError>;

fn format_keys(ids: &[NodeKey]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run `work` as one transaction.
///
/// The outer `Result` carries connection-level failures, which end the run.
/// The inner one is the row's own result: on a row-level error the
/// transaction has already been rolled back.
pub(crate) fn run_in_transaction<T>(
    backend: &mut dyn GraphBackend,
    phase: Phase,
    work: impl FnOnce(&mut dyn GraphBackend) -> BackendResult<T>,
) -> IngestResult<BackendResult<T>> {
    let fatal = |source: BackendError| IngestError::Connection { phase, source };

    backend.begin().map_err(fatal)?;

    let error = match work(&mut *backend) {
        Ok(value) => match backend.commit() {
            Ok(()) => return Ok(Ok(value)),
            Err(e) => e,
        },
        Err(e) => e,
    };

    if error.is_connection_level() {
        if let Err(rollback_error) = backend.rollback() {
            warn!(%phase, error = %rollback_error, "rollback after connection failure also failed");
        }
        return Err(fatal(error));
    }

    backend.rollback().map_err(fatal)?;
    Ok(Err(error))
}

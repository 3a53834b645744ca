//! Per-row outcomes and run reports

use super::Phase;
use crate::graph::{EdgeType, NodeKey};
use crate::source::RejectedRow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use tracing::{error, info, warn};

/// Why a row was not written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownNodeType(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnknownNodeType(raw) => write!(f, "unknown node type '{}'", raw),
        }
    }
}

/// Result of processing one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Success,
    Skipped(SkipReason),
    Error(String),
}

impl RowOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            RowOutcome::Success => OutcomeKind::Success,
            RowOutcome::Skipped(_) => OutcomeKind::Skipped,
            RowOutcome::Error(_) => OutcomeKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Skipped,
    Error,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Error => "error",
        })
    }
}

/// Structured record of one processed row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDiagnostic {
    pub phase: Phase,
    pub row_index: usize,
    pub id: Option<String>,
    pub outcome: OutcomeKind,
    pub detail: String,
}

impl RowDiagnostic {
    pub fn new(
        phase: Phase,
        row_index: usize,
        id: impl fmt::Display,
        outcome: &RowOutcome,
        detail: impl Into<String>,
    ) -> Self {
        let detail = match outcome {
            RowOutcome::Success => detail.into(),
            RowOutcome::Skipped(reason) => reason.to_string(),
            RowOutcome::Error(message) => message.clone(),
        };
        Self {
            phase,
            row_index,
            id: Some(id.to_string()),
            outcome: outcome.kind(),
            detail,
        }
    }

    pub fn rejected(row: &RejectedRow) -> Self {
        Self {
            phase: row.phase,
            row_index: row.row_index,
            id: row.id.clone(),
            outcome: OutcomeKind::Error,
            detail: format!("rejected at load: {}", row.error),
        }
    }

    /// Log this record at the level matching its outcome
    pub fn emit(&self) {
        let id = self.id.as_deref().unwrap_or("-");
        match self.outcome {
            OutcomeKind::Success => info!(
                phase = %self.phase,
                row_index = self.row_index,
                id,
                outcome = %self.outcome,
                "{}",
                self.detail
            ),
            OutcomeKind::Skipped => warn!(
                phase = %self.phase,
                row_index = self.row_index,
                id,
                outcome = %self.outcome,
                "{}",
                self.detail
            ),
            OutcomeKind::Error => error!(
                phase = %self.phase,
                row_index = self.row_index,
                id,
                outcome = %self.outcome,
                "{}",
                self.detail
            ),
        }
    }
}

/// An edge that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedEdge {
    pub row_index: usize,
    pub edge_type: EdgeType,
    pub from: NodeKey,
    pub to: NodeKey,
    pub reason: String,
}

/// Counts and diagnostics of one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub rows_total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub edges_created: usize,
    pub edges_existing: usize,
    pub diagnostics: Vec<RowDiagnostic>,
    pub unresolved: Vec<UnresolvedEdge>,
}

impl PhaseReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            rows_total: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            nodes_created: 0,
            nodes_updated: 0,
            edges_created: 0,
            edges_existing: 0,
            diagnostics: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    /// Log a row record and fold it into the counts
    pub fn record(&mut self, diagnostic: RowDiagnostic) {
        diagnostic.emit();
        self.rows_total += 1;
        match diagnostic.outcome {
            OutcomeKind::Success => self.succeeded += 1,
            OutcomeKind::Skipped => self.skipped += 1,
            OutcomeKind::Error => self.failed += 1,
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn record_rejected<'a>(&mut self, rows: impl IntoIterator<Item = &'a RejectedRow>) {
        for row in rows {
            self.record(RowDiagnostic::rejected(row));
        }
    }

    /// Order diagnostics and unresolved edges by source row
    pub fn finish(&mut self) {
        self.diagnostics.sort_by_key(|d| d.row_index);
        self.unresolved.sort_by_key(|u| u.row_index);
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.outcome == OutcomeKind::Error)
    }

    pub fn skips(&self) -> impl Iterator<Item = &RowDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.outcome == OutcomeKind::Skipped)
    }

    pub fn unresolved_of(&self, edge_type: EdgeType) -> impl Iterator<Item = &UnresolvedEdge> {
        self.unresolved
            .iter()
            .filter(move |u| u.edge_type == edge_type)
    }
}

/// Report of a full ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub backend: String,
    pub started_at: String,
    pub finished_at: String,
    /// IDs used by both a system-model row and a vulnerability row
    pub id_collisions: Vec<NodeKey>,
    pub vulnerabilities: PhaseReport,
    pub system_model: PhaseReport,
}

impl IngestReport {
    pub fn phases(&self) -> [&PhaseReport; 2] {
        [&self.vulnerabilities, &self.system_model]
    }

    pub fn rows_failed(&self) -> usize {
        self.phases().iter().map(|p| p.failed).sum()
    }

    pub fn rows_skipped(&self) -> usize {
        self.phases().iter().map(|p| p.skipped).sum()
    }

    /// True when every row of both phases was written
    pub fn is_clean(&self) -> bool {
        self.rows_failed() == 0 && self.rows_skipped() == 0
    }

    pub fn write_json<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }
}

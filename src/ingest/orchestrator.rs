//! Run driver
//!
//! `Start -> VulnPhase -> SystemPhase -> Done`. The vulnerability phase always
//! completes before the system phase starts, since inferred links need their
//! target nodes. The backend is closed exactly once, whether the run
//! succeeds or not.

use super::report::{IngestReport, PhaseReport};
use super::system::ingest_system_model;
use super::vulnerability::ingest_vulnerabilities;
use super::{IngestError, IngestResult, Phase};
use crate::backend::GraphBackend;
use crate::config::{IdCollisionPolicy, IngestConfig};
use crate::graph::NodeKey;
use crate::source::Dataset;
use chrono::Utc;
use indexmap::IndexSet;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    VulnPhase,
    SystemPhase,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Start => "START",
            RunState::VulnPhase => "VULN_PHASE",
            RunState::SystemPhase => "SYSTEM_PHASE",
            RunState::Done => "DONE",
        })
    }
}

/// Drives both phases over one backend
#[derive(Debug, Clone, Default)]
pub struct Ingestor {
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// IDs used by both a component and a vulnerability, in catalog order
    pub fn find_id_collisions(dataset: &Dataset) -> Vec<NodeKey> {
        let components: IndexSet<NodeKey> = dataset
            .system_model
            .iter()
            .map(|record| record.key())
            .collect();

        let mut collisions = IndexSet::new();
        for vulnerability in &dataset.vulnerabilities {
            if components.contains(&vulnerability.id) {
                collisions.insert(vulnerability.id.clone());
            }
        }
        collisions.into_iter().collect()
    }

    /// Ingest `dataset` into `backend` and close it.
    ///
    /// Returns `Err` only for run-level failures: an ID collision under the
    /// `reject` policy, a connection failure, or a failed close.
    pub fn run(&self, backend: &mut dyn GraphBackend, dataset: &Dataset) -> IngestResult<IngestReport> {
        let backend_name = backend.name();
        info!(
            backend = backend_name,
            vulnerabilities = dataset.vulnerabilities.len(),
            components = dataset.system_model.len(),
            rejected = dataset.rejected.len(),
            "ingestion started"
        );

        let result = self.run_phases(backend, dataset);

        match (result, backend.close()) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(source)) => Err(IngestError::Close {
                backend: backend_name,
                source,
            }),
            (Err(e), close) => {
                if let Err(close_error) = close {
                    warn!(backend = backend_name, error = %close_error, "close after failed run also failed");
                }
                error!(backend = backend_name, error = %e, "ingestion aborted");
                Err(e)
            }
        }
    }

    fn run_phases(&self, backend: &mut dyn GraphBackend, dataset: &Dataset) -> IngestResult<IngestReport> {
        let started_at = Utc::now().to_rfc3339();
        let mut state = RunState::Start;
        debug!(%state, "run state");

        let id_collisions = Self::find_id_collisions(dataset);
        if !id_collisions.is_empty() {
            match self.config.id_collision {
                IdCollisionPolicy::Reject => {
                    return Err(IngestError::IdCollision { ids: id_collisions });
                }
                IdCollisionPolicy::Warn => {
                    warn!(
                        count = id_collisions.len(),
                        ids = ?id_collisions,
                        "component and vulnerability IDs overlap"
                    );
                }
            }
        }

        state = RunState::VulnPhase;
        debug!(%state, "run state");
        let mut vulnerabilities = ingest_vulnerabilities(backend, &dataset.vulnerabilities)?;
        with_rejected(&mut vulnerabilities, dataset);

        state = RunState::SystemPhase;
        debug!(%state, "run state");
        let mut system_model = ingest_system_model(
            backend,
            &dataset.system_model,
            &dataset.vulnerabilities,
            &self.config,
        )?;
        with_rejected(&mut system_model, dataset);

        state = RunState::Done;
        debug!(%state, "run state");

        let report = IngestReport {
            backend: backend.name().to_string(),
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            id_collisions,
            vulnerabilities,
            system_model,
        };
        info!(
            rows_failed = report.rows_failed(),
            rows_skipped = report.rows_skipped(),
            clean = report.is_clean(),
            "ingestion finished"
        );
        Ok(report)
    }
}

/// Fold the rows rejected at load into the report of their phase
fn with_rejected(report: &mut PhaseReport, dataset: &Dataset) {
    let phase: Phase = report.phase;
    report.record_rejected(dataset.rejected_in(phase));
    report.finish();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::graph::EdgeType;
    use crate::model::{SystemModelRecord, VulnerabilityRecord};

    fn dataset() -> Dataset {
        Dataset::new(
            vec![
                SystemModelRecord::new(0, 1, "ECU")
                    .with_name("Gateway")
                    .with_interfaces("CAN")
                    .with_connects_to([2]),
                SystemModelRecord::new(1, 2, "CAN-Bus").with_name("Powertrain CAN"),
            ],
            vec![VulnerabilityRecord::new(0, "V1").with_interfaces("CAN,LIN")],
        )
    }

    #[test]
    fn test_run_writes_both_phases() {
        let mut backend = MemoryBackend::new();
        let report = Ingestor::default().run(&mut backend, &dataset()).unwrap();

        assert_eq!(report.backend, "memory");
        assert!(report.is_clean());
        assert_eq!(report.vulnerabilities.nodes_created, 1);
        assert_eq!(report.system_model.nodes_created, 2);
        assert_eq!(report.system_model.edges_created, 2);

        let store = backend.store();
        assert_eq!(store.get_edges_by_type(EdgeType::ConnectsTo).len(), 1);
        assert_eq!(store.get_edges_by_type(EdgeType::HasVulnerability).len(), 1);
    }

    #[test]
    fn test_collision_rejected_before_writes() {
        let mut data = dataset();
        data.vulnerabilities.push(VulnerabilityRecord::new(1, 2i64));

        let mut backend = MemoryBackend::new();
        let err = Ingestor::default().run(&mut backend, &data).unwrap_err();
        match err {
            IngestError::IdCollision { ids } => assert_eq!(ids, vec![NodeKey::Int(2)]),
            other => panic!("expected collision, got {:?}", other),
        }
        assert_eq!(backend.store().node_count(), 0);
    }

    #[test]
    fn test_find_id_collisions_is_empty_for_disjoint_sets() {
        assert!(Ingestor::find_id_collisions(&dataset()).is_empty());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(RunState::VulnPhase.to_string(), "VULN_PHASE");
        assert_eq!(RunState::Done.to_string(), "DONE");
    }
}

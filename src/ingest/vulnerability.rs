//! Vulnerability phase

use super::report::{PhaseReport, RowDiagnostic, RowOutcome};
use super::{run_in_transaction, IngestResult, Phase};
use crate::backend::{GraphBackend, Upserted};
use crate::graph::NodeLabel;
use crate::model::VulnerabilityRecord;
use tracing::info;

/// Upsert one `Vulnerability` node per record.
///
/// Only a connection-level failure returns `Err`; failing rows are recorded
/// in the report and the remaining rows are still processed.
pub fn ingest_vulnerabilities(
    backend: &mut dyn GraphBackend,
    records: &[VulnerabilityRecord],
) -> IngestResult<PhaseReport> {
    let phase = Phase::Vulnerabilities;
    let mut report = PhaseReport::new(phase);
    info!(%phase, rows = records.len(), backend = backend.name(), "phase started");

    for record in records {
        let result = run_in_transaction(backend, phase, |b| {
            b.upsert_node(NodeLabel::Vulnerability, &record.id, record.properties())
        })?;

        let (outcome, detail) = match result {
            Ok(Upserted::Created) => {
                report.nodes_created += 1;
                (RowOutcome::Success, "vulnerability created")
            }
            Ok(Upserted::Updated) => {
                report.nodes_updated += 1;
                (RowOutcome::Success, "vulnerability updated")
            }
            Err(e) => (
                RowOutcome::Error(format!("error processing vulnerability row: {}", e)),
                "",
            ),
        };
        report.record(RowDiagnostic::new(phase, record.row_index, &record.id, &outcome, detail));
    }

    report.finish();
    info!(
        %phase,
        succeeded = report.succeeded,
        failed = report.failed,
        "phase finished"
    );
    Ok(report)
}

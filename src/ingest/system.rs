//! System model phase
//!
//! For every component row, in sheet order:
//! 1. resolve the raw type to a label (unknown types skip the row)
//! 2. upsert the component node
//! 3. merge a `CONNECTS_TO` edge for each referenced ID that already exists
//! 4. merge a `HAS_VULNERABILITY` edge for each inferred vulnerability
//!
//! Steps 2-4 of a row share one transaction. References to components that
//! appear later in the sheet are retried once after the last row.

use super::inference::infer_vulnerability_links;
use super::labels::resolve_label;
use super::report::{PhaseReport, RowDiagnostic, RowOutcome, SkipReason, UnresolvedEdge};
use super::{run_in_transaction, IngestResult, Phase};
use crate::backend::{BackendResult, EdgeMerge, GraphBackend, Upserted};
use crate::config::IngestConfig;
use crate::graph::{EdgeType, NodeKey, NodeLabel};
use crate::model::{SystemModelRecord, VulnerabilityRecord};
use indexmap::IndexMap;
use tracing::{debug, info, trace};

/// Immutable `id -> (sheet position, name)` lookup over all component rows
#[derive(Debug, Clone, Default)]
pub struct ComponentDirectory {
    entries: IndexMap<i64, (usize, String)>,
}

impl ComponentDirectory {
    /// First occurrence wins when an ID is repeated
    pub fn build(records: &[SystemModelRecord]) -> Self {
        let mut entries = IndexMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            entries
                .entry(record.id)
                .or_insert_with(|| (position, record.display_name()));
        }
        Self { entries }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.entries.get(&id).map(|(_, name)| name.as_str())
    }

    /// Position of the row that defines `id`
    pub fn position_of(&self, id: i64) -> Option<usize> {
        self.entries.get(&id).map(|(position, _)| *position)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Writes of one committed row
#[derive(Debug, Default)]
struct RowWrites {
    upserted: Option<Upserted>,
    connects_to: Vec<(i64, EdgeMerge)>,
    links: Vec<(NodeKey, EdgeMerge)>,
}

/// `CONNECTS_TO` edge queued until every row has been written
#[derive(Debug)]
struct DeferredEdge {
    row_index: usize,
    from: i64,
    to: i64,
}

struct SystemPhase<'a> {
    config: &'a IngestConfig,
    directory: ComponentDirectory,
    vulnerabilities: &'a [VulnerabilityRecord],
    report: PhaseReport,
    deferred: Vec<DeferredEdge>,
}

/// Upsert component nodes with their structural and inferred edges.
///
/// Inferred edges only land on vulnerability nodes that already exist, so
/// the vulnerability phase must have run first. Links whose target is
/// missing are listed in [`PhaseReport::unresolved`].
pub fn ingest_system_model(
    backend: &mut dyn GraphBackend,
    records: &[SystemModelRecord],
    vulnerabilities: &[VulnerabilityRecord],
    config: &IngestConfig,
) -> IngestResult<PhaseReport> {
    let phase = Phase::SystemModel;
    info!(
        %phase,
        rows = records.len(),
        vulnerabilities = vulnerabilities.len(),
        backend = backend.name(),
        "phase started"
    );

    let mut state = SystemPhase {
        config,
        directory: ComponentDirectory::build(records),
        vulnerabilities,
        report: PhaseReport::new(phase),
        deferred: Vec::new(),
    };

    for (position, record) in records.iter().enumerate() {
        state.ingest_row(backend, position, record)?;
    }
    state.resolve_deferred(backend)?;

    let mut report = state.report;
    report.finish();
    info!(
        %phase,
        succeeded = report.succeeded,
        skipped = report.skipped,
        failed = report.failed,
        edges_created = report.edges_created,
        unresolved = report.unresolved.len(),
        "phase finished"
    );
    Ok(report)
}

impl SystemPhase<'_> {
    fn ingest_row(
        &mut self,
        backend: &mut dyn GraphBackend,
        position: usize,
        record: &SystemModelRecord,
    ) -> IngestResult<()> {
        let phase = Phase::SystemModel;

        let label = match resolve_label(&record.node_type) {
            Ok(label) => label,
            Err(unknown) => {
                let outcome = RowOutcome::Skipped(SkipReason::UnknownNodeType(unknown.0));
                self.report
                    .record(RowDiagnostic::new(phase, record.row_index, record.id, &outcome, ""));
                return Ok(());
            }
        };

        let links = infer_vulnerability_links(
            record.interfaces.tokens(),
            self.vulnerabilities,
            self.config.interface_match,
        );

        let directory = &self.directory;
        let result = run_in_transaction(backend, phase, |b| {
            write_component(b, label, record, &links, directory)
        })?;

        let writes = match result {
            Ok(writes) => writes,
            Err(e) => {
                let outcome = RowOutcome::Error(format!("error processing row: {}", e));
                self.report
                    .record(RowDiagnostic::new(phase, record.row_index, record.id, &outcome, ""));
                return Ok(());
            }
        };

        let detail = self.tally(position, record, &writes);
        self.report.record(RowDiagnostic::new(
            phase,
            record.row_index,
            record.id,
            &RowOutcome::Success,
            format!("processed {} '{}': {}", label, record.display_name(), detail),
        ));
        Ok(())
    }

    /// Fold a committed row into the report; returns a one-line summary
    fn tally(&mut self, position: usize, record: &SystemModelRecord, writes: &RowWrites) -> String {
        match writes.upserted {
            Some(Upserted::Created) => self.report.nodes_created += 1,
            Some(Upserted::Updated) => self.report.nodes_updated += 1,
            None => {}
        }

        let mut connected = 0;
        for (target, merge) in &writes.connects_to {
            match merge {
                EdgeMerge::Created => {
                    self.report.edges_created += 1;
                    connected += 1;
                }
                EdgeMerge::Existing => {
                    self.report.edges_existing += 1;
                    connected += 1;
                }
                EdgeMerge::Unresolved => self.unresolved_reference(position, record, *target),
            }
        }

        let mut linked = 0;
        for (vulnerability, merge) in &writes.links {
            match merge {
                EdgeMerge::Created => {
                    self.report.edges_created += 1;
                    linked += 1;
                }
                EdgeMerge::Existing => {
                    self.report.edges_existing += 1;
                    linked += 1;
                }
                EdgeMerge::Unresolved => {
                    debug!(
                        from = record.id,
                        to = %vulnerability,
                        "vulnerability node missing, link not written"
                    );
                    self.report.unresolved.push(UnresolvedEdge {
                        row_index: record.row_index,
                        edge_type: EdgeType::HasVulnerability,
                        from: record.key(),
                        to: vulnerability.clone(),
                        reason: "vulnerability node not found".to_string(),
                    });
                }
            }
        }

        format!(
            "{} {}, {} {}",
            connected,
            EdgeType::ConnectsTo,
            linked,
            EdgeType::HasVulnerability
        )
    }

    fn unresolved_reference(&mut self, position: usize, record: &SystemModelRecord, target: i64) {
        let later_row = self
            .directory
            .position_of(target)
            .is_some_and(|target_position| target_position > position);

        if later_row && self.config.defer_forward_references {
            trace!(
                from = record.id,
                to = target,
                target_name = self.directory.name_of(target).unwrap_or("-"),
                "forward reference deferred"
            );
            self.deferred.push(DeferredEdge {
                row_index: record.row_index,
                from: record.id,
                to: target,
            });
            return;
        }

        let reason = match self.directory.name_of(target) {
            Some(name) => format!("component '{}' was not written", name),
            None => "no component with this ID".to_string(),
        };
        trace!(from = record.id, to = target, %reason, "reference not resolved");
        self.report.unresolved.push(UnresolvedEdge {
            row_index: record.row_index,
            edge_type: EdgeType::ConnectsTo,
            from: NodeKey::Int(record.id),
            to: NodeKey::Int(target),
            reason,
        });
    }

    fn resolve_deferred(&mut self, backend: &mut dyn GraphBackend) -> IngestResult<()> {
        if self.deferred.is_empty() {
            return Ok(());
        }
        debug!(count = self.deferred.len(), "retrying forward references");

        for edge in std::mem::take(&mut self.deferred) {
            let from = NodeKey::Int(edge.from);
            let to = NodeKey::Int(edge.to);
            let result = run_in_transaction(backend, Phase::SystemModel, |b| {
                b.merge_edge(EdgeType::ConnectsTo, &from, &to)
            })?;

            let reason = match result {
                Ok(EdgeMerge::Created) => {
                    self.report.edges_created += 1;
                    continue;
                }
                Ok(EdgeMerge::Existing) => {
                    self.report.edges_existing += 1;
                    continue;
                }
                Ok(EdgeMerge::Unresolved) => match self.directory.name_of(edge.to) {
                    Some(name) => format!("component '{}' was not written", name),
                    None => "no component with this ID".to_string(),
                },
                Err(e) => format!("deferred edge failed: {}", e),
            };
            trace!(from = edge.from, to = edge.to, %reason, "reference not resolved");
            self.report.unresolved.push(UnresolvedEdge {
                row_index: edge.row_index,
                edge_type: EdgeType::ConnectsTo,
                from,
                to,
                reason,
            });
        }
        Ok(())
    }
}

/// The writes of one component row, run inside its transaction
fn write_component(
    backend: &mut dyn GraphBackend,
    label: NodeLabel,
    record: &SystemModelRecord,
    links: &[NodeKey],
    directory: &ComponentDirectory,
) -> BackendResult<RowWrites> {
    let key = record.key();
    let mut writes = RowWrites {
        upserted: Some(backend.upsert_node(label, &key, record.properties())?),
        ..Default::default()
    };

    for &target in &record.connects_to {
        // only IDs of system-model rows are component references
        if !directory.contains(target) {
            writes.connects_to.push((target, EdgeMerge::Unresolved));
            continue;
        }
        let merge = backend.merge_edge(EdgeType::ConnectsTo, &key, &NodeKey::Int(target))?;
        writes.connects_to.push((target, merge));
    }

    for vulnerability in links {
        let merge = backend.merge_edge(EdgeType::HasVulnerability, &key, vulnerability)?;
        writes.links.push((vulnerability.clone(), merge));
    }

    Ok(writes)
}

//! In-memory backend over [`GraphStore`]
//!
//! Transactions are implemented with an undo journal: every mutation made
//! inside a transaction records how to revert it, and rollback replays the
//! journal backwards.

use super::{BackendError, BackendResult, EdgeMerge, GraphBackend, Upserted};
use crate::graph::{
    EdgeId, EdgeType, GraphSnapshot, GraphStore, NodeId, NodeKey, NodeLabel, NodeMerge,
    PropertyMap,
};
use tracing::{debug, trace};

#[derive(Debug)]
enum UndoOp {
    NodeCreated(NodeId),
    NodeUpdated { id: NodeId, previous: PropertyMap },
    EdgeCreated(EdgeId),
}

/// Backend writing into an owned [`GraphStore`]
#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: GraphStore,
    journal: Option<Vec<UndoOp>>,
    closed: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue writing into an existing store
    pub fn with_store(store: GraphStore) -> Self {
        Self {
            store,
            journal: None,
            closed: false,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn into_store(self) -> GraphStore {
        self.store
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(&self.store)
    }

    pub fn in_transaction(&self) -> bool {
        self.journal.is_some()
    }

    fn journal(&mut self) -> BackendResult<&mut Vec<UndoOp>> {
        if self.closed {
            return Err(BackendError::Connection("memory backend is closed".to_string()));
        }
        self.journal
            .as_mut()
            .ok_or(BackendError::TransactionState("no open transaction"))
    }
}

impl GraphBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn begin(&mut self) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Connection("memory backend is closed".to_string()));
        }
        if self.journal.is_some() {
            return Err(BackendError::TransactionState("transaction already open"));
        }
        self.journal = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> BackendResult<()> {
        let ops = self.journal()?.len();
        self.journal = None;
        trace!(ops, "memory transaction committed");
        Ok(())
    }

    fn rollback(&mut self) -> BackendResult<()> {
        let journal = std::mem::take(self.journal()?);
        self.journal = None;
        debug!(ops = journal.len(), "rolling back memory transaction");

        for op in journal.into_iter().rev() {
            match op {
                UndoOp::EdgeCreated(id) => {
                    self.store.discard_last_edge(id)?;
                }
                UndoOp::NodeCreated(id) => {
                    self.store.discard_last_node(id)?;
                }
                UndoOp::NodeUpdated { id, previous } => {
                    self.store.replace_node_properties(id, previous)?;
                }
            }
        }
        Ok(())
    }

    fn upsert_node(
        &mut self,
        label: NodeLabel,
        key: &NodeKey,
        properties: PropertyMap,
    ) -> BackendResult<Upserted> {
        self.journal()?;
        let merge = self.store.merge_node(label, key.clone(), properties)?;
        let journal = self.journal()?;
        Ok(match merge {
            NodeMerge::Created(id) => {
                journal.push(UndoOp::NodeCreated(id));
                Upserted::Created
            }
            NodeMerge::Updated { id, previous } => {
                journal.push(UndoOp::NodeUpdated { id, previous });
                Upserted::Updated
            }
        })
    }

    fn merge_edge(
        &mut self,
        edge_type: EdgeType,
        from: &NodeKey,
        to: &NodeKey,
    ) -> BackendResult<EdgeMerge> {
        self.journal()?;

        let Some(source) = self.store.find_node(from).map(|n| n.id) else {
            return Ok(EdgeMerge::Unresolved);
        };
        let Some(target) = self.store.find_node(to) else {
            return Ok(EdgeMerge::Unresolved);
        };
        if !edge_type.accepts_target(target.label) {
            return Ok(EdgeMerge::Unresolved);
        }
        let target = target.id;

        let (edge_id, created) = self.store.merge_edge(source, target, edge_type)?;
        if !created {
            return Ok(EdgeMerge::Existing);
        }
        self.journal()?.push(UndoOp::EdgeCreated(edge_id));
        Ok(EdgeMerge::Created)
    }

    fn close(&mut self) -> BackendResult<()> {
        if self.journal.is_some() {
            self.rollback()?;
        }
        self.closed = true;
        Ok(())
    }
}

//! Datastore backends
//!
//! The ingestion core talks to its datastore only through [`GraphBackend`]:
//! keyed node upserts and keyed edge merges, grouped into transactions. Two
//! backends ship with the crate:
//! - [`MemoryBackend`]: the in-memory [`GraphStore`](crate::graph::GraphStore)
//! - [`CypherScriptBackend`]: Cypher statements written to any `io::Write`

pub mod cypher;
pub mod memory;

pub use cypher::CypherScriptBackend;
pub use memory::MemoryBackend;

use crate::graph::{EdgeType, GraphError, NodeKey, NodeLabel, PropertyMap};
use thiserror::Error;

/// Backend errors
#[derive(Error, Debug)]
pub enum BackendError {
    /// The graph rejected a single mutation
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// The datastore refused a statement (constraint violation, bad value)
    #[error("Statement rejected: {0}")]
    Rejected(String),

    /// Session-level failure: the datastore cannot be reached or was closed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Output sink failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// begin/commit/rollback called out of order
    #[error("Transaction error: {0}")]
    TransactionState(&'static str),
}

impl BackendError {
    /// Connection-level errors abort an ingestion run; everything else is row-local
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            BackendError::Connection(_) | BackendError::Io(_) | BackendError::TransactionState(_)
        )
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Outcome of a node upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

/// Outcome of an edge merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMerge {
    Created,
    /// The edge was already present
    Existing,
    /// One endpoint does not exist (or the target has the wrong label); nothing was written
    Unresolved,
}

/// Transactional graph datastore
///
/// All mutations happen between `begin` and `commit`/`rollback`. A rolled
/// back transaction leaves no trace in the store.
pub trait GraphBackend {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn begin(&mut self) -> BackendResult<()>;

    fn commit(&mut self) -> BackendResult<()>;

    fn rollback(&mut self) -> BackendResult<()>;

    /// `MERGE (n:label {id: key}) SET n += properties`
    fn upsert_node(
        &mut self,
        label: NodeLabel,
        key: &NodeKey,
        properties: PropertyMap,
    ) -> BackendResult<Upserted>;

    /// `MATCH (a {id: from}), (b {id: to}) MERGE (a)-[:edge_type]->(b)`
    ///
    /// A missing endpoint, or a target that [`EdgeType::accepts_target`]
    /// refuses, yields [`EdgeMerge::Unresolved`], not an error.
    fn merge_edge(
        &mut self,
        edge_type: EdgeType,
        from: &NodeKey,
        to: &NodeKey,
    ) -> BackendResult<EdgeMerge>;

    /// Release the session. Further calls fail with a connection error.
    fn close(&mut self) -> BackendResult<()>;
}

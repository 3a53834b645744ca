//! Property graph holding the ingested system model
//!
//! This module implements the in-memory property graph used as the default
//! ingestion target:
//! - Nodes with a closed set of labels, a unique business key, and properties
//! - Directed, typed edges with at most one edge per (source, target, type)
//! - Hash-based indices for key, label, and edge type lookups

pub mod edge;
pub mod node;
pub mod property;
pub mod snapshot;
pub mod store;
pub mod types;

// Re-export main types
pub use edge::{Edge, EdgeIdentity};
pub use node::Node;
pub use property::{PropertyMap, PropertyValue};
pub use snapshot::{EdgeRecord, GraphSnapshot, NodeRecord};
pub use store::{GraphError, GraphResult, GraphStatistics, GraphStore, NodeMerge};
pub use types::{EdgeId, EdgeType, NodeId, NodeKey, NodeLabel};

//! Serializable view of a finished graph
//!
//! Edges reference nodes by business key so a snapshot can be diffed across
//! runs without depending on arena IDs.

use super::property::PropertyMap;
use super::store::GraphStore;
use super::types::{EdgeType, NodeKey, NodeLabel};
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub label: NodeLabel,
    pub id: NodeKey,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub from: NodeKey,
    pub to: NodeKey,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl GraphSnapshot {
    /// Capture every node and edge of `store`, in creation order
    pub fn capture(store: &GraphStore) -> Self {
        let nodes = store
            .all_nodes()
            .iter()
            .map(|node| NodeRecord {
                label: node.label,
                id: node.key.clone(),
                properties: node.properties.clone(),
            })
            .collect();

        let edges = store
            .all_edges()
            .iter()
            .filter_map(|edge| {
                let from = store.get_node(edge.source)?;
                let to = store.get_node(edge.target)?;
                Some(EdgeRecord {
                    edge_type: edge.edge_type,
                    from: from.key.clone(),
                    to: to.key.clone(),
                })
            })
            .collect();

        GraphSnapshot { nodes, edges }
    }

    /// Write the snapshot as pretty-printed JSON
    pub fn write_json<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }
}

//! In-memory graph storage implementation
//!
//! Nodes and edges live in append-only arenas indexed by their IDs. On top of
//! the arenas the store keeps:
//! - a key index (business key -> NodeId) that makes node upserts idempotent
//! - an edge index ((source, target, type) -> EdgeId) that makes edge merges idempotent
//! - label and edge type indices for lookups
//!
//! Only the most recently created node or edge can be discarded, which is all
//! the backend's undo journal needs to roll back a row.

use super::edge::{Edge, EdgeIdentity};
use super::node::Node;
use super::property::PropertyMap;
use super::types::{EdgeId, EdgeType, NodeId, NodeKey, NodeLabel};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("Node with id {0} already exists")]
    NodeAlreadyExists(NodeKey),

    #[error("Node with id {key} is labelled {existing}, cannot upsert it as {requested}")]
    LabelConflict {
        key: NodeKey,
        existing: NodeLabel,
        requested: NodeLabel,
    },

    #[error("Invalid edge: source node {0} does not exist")]
    InvalidEdgeSource(NodeId),

    #[error("Invalid edge: target node {0} does not exist")]
    InvalidEdgeTarget(NodeId),

    #[error("{0} is not the most recent entry and cannot be discarded")]
    NotDiscardable(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Result of [`GraphStore::merge_node`]
#[derive(Debug, Clone, PartialEq)]
pub enum NodeMerge {
    /// A new node was created
    Created(NodeId),
    /// An existing node was updated; `previous` holds its properties before the update
    Updated { id: NodeId, previous: PropertyMap },
}

impl NodeMerge {
    pub fn node_id(&self) -> NodeId {
        match self {
            NodeMerge::Created(id) => *id,
            NodeMerge::Updated { id, .. } => *id,
        }
    }
}

/// Node and edge counts broken down by label and type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_label: BTreeMap<NodeLabel, usize>,
    pub edges_by_type: BTreeMap<EdgeType, usize>,
}

/// In-memory graph storage
#[derive(Debug, Default)]
pub struct GraphStore {
    /// Node arena, indexed by NodeId
    nodes: Vec<Node>,

    /// Edge arena, indexed by EdgeId
    edges: Vec<Edge>,

    /// Outgoing edges for each node (adjacency list)
    outgoing: Vec<Vec<EdgeId>>,

    /// Incoming edges for each node (adjacency list)
    incoming: Vec<Vec<EdgeId>>,

    /// Business key index
    key_index: FxHashMap<NodeKey, NodeId>,

    /// (source, target, type) index
    edge_index: FxHashMap<EdgeIdentity, EdgeId>,

    /// Label index for fast lookups
    label_index: HashMap<NodeLabel, BTreeSet<NodeId>>,

    /// Edge type index for fast lookups
    edge_type_index: HashMap<EdgeType, BTreeSet<EdgeId>>,
}

impl GraphStore {
    /// Create a new empty graph store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node. Fails if a node with the same key exists.
    pub fn create_node(
        &mut self,
        label: NodeLabel,
        key: NodeKey,
        properties: PropertyMap,
    ) -> GraphResult<NodeId> {
        if self.key_index.contains_key(&key) {
            return Err(GraphError::NodeAlreadyExists(key));
        }

        let node_id = NodeId::new(self.nodes.len() as u64);
        let node = Node::new_with_properties(node_id, label, key.clone(), properties);

        self.key_index.insert(key, node_id);
        self.label_index.entry(label).or_default().insert(node_id);
        self.nodes.push(node);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());

        Ok(node_id)
    }

    /// Create the node if its key is unknown, otherwise overwrite the given
    /// properties on the existing node. The label of an existing node is
    /// never changed.
    pub fn merge_node(
        &mut self,
        label: NodeLabel,
        key: NodeKey,
        properties: PropertyMap,
    ) -> GraphResult<NodeMerge> {
        let Some(&id) = self.key_index.get(&key) else {
            return self.create_node(label, key, properties).map(NodeMerge::Created);
        };

        let node = &mut self.nodes[id.index()];
        if node.label != label {
            return Err(GraphError::LabelConflict {
                key,
                existing: node.label,
                requested: label,
            });
        }

        let previous = node.properties.clone();
        node.merge_properties(properties);
        Ok(NodeMerge::Updated { id, previous })
    }

    /// Replace all properties of a node, returning the old ones
    pub fn replace_node_properties(
        &mut self,
        id: NodeId,
        properties: PropertyMap,
    ) -> GraphResult<PropertyMap> {
        let node = self
            .nodes
            .get_mut(id.index())
            .ok_or(GraphError::NodeNotFound(id))?;
        Ok(std::mem::replace(&mut node.properties, properties))
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Check if a node exists
    pub fn has_node(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    /// Resolve a business key to its node
    pub fn find_node(&self, key: &NodeKey) -> Option<&Node> {
        self.key_index.get(key).and_then(|&id| self.get_node(id))
    }

    /// Create an edge between two nodes
    pub fn create_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: EdgeType,
    ) -> GraphResult<EdgeId> {
        if !self.has_node(source) {
            return Err(GraphError::InvalidEdgeSource(source));
        }
        if !self.has_node(target) {
            return Err(GraphError::InvalidEdgeTarget(target));
        }

        let edge_id = EdgeId::new(self.edges.len() as u64);
        let edge = Edge::new(edge_id, source, target, edge_type);

        self.outgoing[source.index()].push(edge_id);
        self.incoming[target.index()].push(edge_id);
        self.edge_index.insert(edge.identity(), edge_id);
        self.edges.push(edge);
        self.edge_type_index
            .entry(edge_type)
            .or_default()
            .insert(edge_id);

        Ok(edge_id)
    }

    /// Find the edge of `edge_type` from `source` to `target`
    pub fn find_edge(&self, source: NodeId, target: NodeId, edge_type: EdgeType) -> Option<EdgeId> {
        self.edge_index.get(&(source, target, edge_type)).copied()
    }

    /// Create the edge unless an identical one exists. Returns the edge and
    /// whether it was created.
    pub fn merge_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: EdgeType,
    ) -> GraphResult<(EdgeId, bool)> {
        if let Some(existing) = self.find_edge(source, target, edge_type) {
            return Ok((existing, false));
        }
        self.create_edge(source, target, edge_type).map(|id| (id, true))
    }

    /// Get an edge by ID
    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.index())
    }

    /// Remove the most recently created node. It must have no edges left.
    pub fn discard_last_node(&mut self, id: NodeId) -> GraphResult<Node> {
        if id.index() + 1 != self.nodes.len() {
            return Err(GraphError::NotDiscardable(id.to_string()));
        }
        if !self.outgoing[id.index()].is_empty() || !self.incoming[id.index()].is_empty() {
            return Err(GraphError::NotDiscardable(id.to_string()));
        }

        self.outgoing.pop();
        self.incoming.pop();
        let node = self.nodes.pop().ok_or(GraphError::NodeNotFound(id))?;
        self.key_index.remove(&node.key);
        if let Some(set) = self.label_index.get_mut(&node.label) {
            set.remove(&id);
        }
        Ok(node)
    }

    /// Remove the most recently created edge
    pub fn discard_last_edge(&mut self, id: EdgeId) -> GraphResult<Edge> {
        if id.index() + 1 != self.edges.len() {
            return Err(GraphError::NotDiscardable(id.to_string()));
        }

        let edge = self.edges.pop().ok_or(GraphError::EdgeNotFound(id))?;
        if let Some(adj) = self.outgoing.get_mut(edge.source.index()) {
            adj.retain(|&eid| eid != id);
        }
        if let Some(adj) = self.incoming.get_mut(edge.target.index()) {
            adj.retain(|&eid| eid != id);
        }
        self.edge_index.remove(&edge.identity());
        if let Some(set) = self.edge_type_index.get_mut(&edge.edge_type) {
            set.remove(&id);
        }
        Ok(edge)
    }

    /// Get all outgoing edges from a node
    pub fn get_outgoing_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.outgoing
            .get(node_id.index())
            .map(|edge_ids| {
                edge_ids
                    .iter()
                    .filter_map(|&id| self.get_edge(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get all nodes with a specific label, in creation order
    pub fn get_nodes_by_label(&self, label: NodeLabel) -> Vec<&Node> {
        self.label_index
            .get(&label)
            .map(|node_ids| {
                node_ids
                    .iter()
                    .filter_map(|&id| self.get_node(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get all edges of a specific type, in creation order
    pub fn get_edges_by_type(&self, edge_type: EdgeType) -> Vec<&Edge> {
        self.edge_type_index
            .get(&edge_type)
            .map(|edge_ids| {
                edge_ids
                    .iter()
                    .filter_map(|&id| self.get_edge(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Business keys of the targets of `edge_type` edges leaving the node with `key`
    pub fn neighbours(&self, key: &NodeKey, edge_type: EdgeType) -> Vec<&NodeKey> {
        let Some(node) = self.find_node(key) else {
            return Vec::new();
        };
        self.get_outgoing_edges(node.id)
            .into_iter()
            .filter(|edge| edge.edge_type == edge_type)
            .filter_map(|edge| self.get_node(edge.target))
            .map(|target| &target.key)
            .collect()
    }

    /// Get total number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get total number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get all nodes in the graph, in creation order
    pub fn all_nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Get all edges in the graph, in creation order
    pub fn all_edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn statistics(&self) -> GraphStatistics {
        let mut stats = GraphStatistics {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            ..Default::default()
        };
        for node in &self.nodes {
            *stats.nodes_by_label.entry(node.label).or_default() += 1;
        }
        for edge in &self.edges {
            *stats.edges_by_type.entry(edge.edge_type).or_default() += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(name: &str) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), name.into());
        props
    }

    #[test]
    fn test_create_and_get_node() {
        let mut store = GraphStore::new();
        let node_id = store
            .create_node(NodeLabel::Ecu, NodeKey::Int(1), props("Gateway"))
            .unwrap();

        assert_eq!(store.node_count(), 1);
        let node = store.get_node(node_id).unwrap();
        assert_eq!(node.id, node_id);
        assert_eq!(node.label, NodeLabel::Ecu);
        assert_eq!(node.get_property("name").unwrap().as_string(), Some("Gateway"));
        assert_eq!(store.find_node(&NodeKey::Int(1)).unwrap().id, node_id);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut store = GraphStore::new();
        store
            .create_node(NodeLabel::Ecu, NodeKey::Int(1), PropertyMap::new())
            .unwrap();
        let result = store.create_node(NodeLabel::Asset, NodeKey::Int(1), PropertyMap::new());
        assert_eq!(result, Err(GraphError::NodeAlreadyExists(NodeKey::Int(1))));
    }

    #[test]
    fn test_merge_node_is_idempotent() {
        let mut store = GraphStore::new();
        let first = store
            .merge_node(NodeLabel::Ecu, NodeKey::Int(1), props("Gateway"))
            .unwrap();
        assert!(matches!(first, NodeMerge::Created(_)));

        let second = store
            .merge_node(NodeLabel::Ecu, NodeKey::Int(1), props("Central Gateway"))
            .unwrap();
        match second {
            NodeMerge::Updated { id, previous } => {
                assert_eq!(id, first.node_id());
                assert_eq!(previous.get("name").unwrap().as_string(), Some("Gateway"));
            }
            other => panic!("expected update, got {:?}", other),
        }

        assert_eq!(store.node_count(), 1);
        let node = store.find_node(&NodeKey::Int(1)).unwrap();
        assert_eq!(node.get_property("name").unwrap().as_string(), Some("Central Gateway"));
    }

    #[test]
    fn test_merge_node_label_conflict() {
        let mut store = GraphStore::new();
        store
            .merge_node(NodeLabel::Ecu, NodeKey::Int(1), PropertyMap::new())
            .unwrap();
        let err = store
            .merge_node(NodeLabel::Asset, NodeKey::Int(1), PropertyMap::new())
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::LabelConflict {
                key: NodeKey::Int(1),
                existing: NodeLabel::Ecu,
                requested: NodeLabel::Asset,
            }
        );
    }

    #[test]
    fn test_edge_validation() {
        let mut store = GraphStore::new();
        let node1 = store
            .create_node(NodeLabel::Ecu, NodeKey::Int(1), PropertyMap::new())
            .unwrap();
        let invalid_node = NodeId::new(999);

        let result = store.create_edge(invalid_node, node1, EdgeType::ConnectsTo);
        assert_eq!(result, Err(GraphError::InvalidEdgeSource(invalid_node)));

        let result = store.create_edge(node1, invalid_node, EdgeType::ConnectsTo);
        assert_eq!(result, Err(GraphError::InvalidEdgeTarget(invalid_node)));
    }

    #[test]
    fn test_merge_edge_is_idempotent() {
        let mut store = GraphStore::new();
        let a = store
            .create_node(NodeLabel::Ecu, NodeKey::Int(1), PropertyMap::new())
            .unwrap();
        let b = store
            .create_node(NodeLabel::CanBus, NodeKey::Int(2), PropertyMap::new())
            .unwrap();

        let (first, created) = store.merge_edge(a, b, EdgeType::ConnectsTo).unwrap();
        assert!(created);
        let (second, created) = store.merge_edge(a, b, EdgeType::ConnectsTo).unwrap();
        assert!(!created);
        assert_eq!(first, second);

        // Reverse direction is a different edge
        let (_, created) = store.merge_edge(b, a, EdgeType::ConnectsTo).unwrap();
        assert!(created);
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn test_adjacency_and_neighbours() {
        let mut store = GraphStore::new();
        let ecu = store
            .create_node(NodeLabel::Ecu, NodeKey::Int(1), PropertyMap::new())
            .unwrap();
        let bus = store
            .create_node(NodeLabel::CanBus, NodeKey::Int(2), PropertyMap::new())
            .unwrap();
        let vuln = store
            .create_node(NodeLabel::Vulnerability, NodeKey::from("V1"), PropertyMap::new())
            .unwrap();

        store.create_edge(ecu, bus, EdgeType::ConnectsTo).unwrap();
        store.create_edge(ecu, vuln, EdgeType::HasVulnerability).unwrap();

        assert_eq!(store.get_outgoing_edges(ecu).len(), 2);
        assert_eq!(store.incoming[bus.index()], vec![EdgeId::new(0)]);
        assert_eq!(
            store.neighbours(&NodeKey::Int(1), EdgeType::HasVulnerability),
            vec![&NodeKey::from("V1")]
        );
        assert!(store.neighbours(&NodeKey::Int(42), EdgeType::ConnectsTo).is_empty());
    }

    #[test]
    fn test_discard_last_entries() {
        let mut store = GraphStore::new();
        let a = store
            .create_node(NodeLabel::Ecu, NodeKey::Int(1), PropertyMap::new())
            .unwrap();
        let b = store
            .create_node(NodeLabel::Ecu, NodeKey::Int(2), PropertyMap::new())
            .unwrap();
        let edge = store.create_edge(b, a, EdgeType::ConnectsTo).unwrap();

        // Node b still has an edge
        assert!(store.discard_last_node(b).is_err());
        // Node a is not the last node
        assert!(store.discard_last_node(a).is_err());

        store.discard_last_edge(edge).unwrap();
        store.discard_last_node(b).unwrap();

        assert_eq!(store.node_count(), 1);
        assert_eq!(store.edge_count(), 0);
        assert!(store.find_node(&NodeKey::Int(2)).is_none());
        assert!(store.get_outgoing_edges(a).is_empty());
        assert!(store.incoming[a.index()].is_empty());
        assert!(store.get_edges_by_type(EdgeType::ConnectsTo).is_empty());

        // The key can be reused after the discard
        store
            .create_node(NodeLabel::Ecu, NodeKey::Int(2), PropertyMap::new())
            .unwrap();
    }

    #[test]
    fn test_label_index_and_statistics() {
        let mut store = GraphStore::new();
        store
            .create_node(NodeLabel::Ecu, NodeKey::Int(1), PropertyMap::new())
            .unwrap();
        store
            .create_node(NodeLabel::Ecu, NodeKey::Int(2), PropertyMap::new())
            .unwrap();
        store
            .create_node(NodeLabel::Vulnerability, NodeKey::Int(100), PropertyMap::new())
            .unwrap();

        assert_eq!(store.get_nodes_by_label(NodeLabel::Ecu).len(), 2);
        assert_eq!(store.get_nodes_by_label(NodeLabel::Asset).len(), 0);

        let stats = store.statistics();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.nodes_by_label[&NodeLabel::Ecu], 2);
        assert_eq!(stats.nodes_by_label[&NodeLabel::Vulnerability], 1);
        assert!(stats.edges_by_type.is_empty());
    }
}

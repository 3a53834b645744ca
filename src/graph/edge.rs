//! Typed relationships between graph nodes

use super::types::{EdgeId, EdgeType, NodeId};
use serde::{Deserialize, Serialize};

/// What makes two edges the same for MERGE purposes
pub type EdgeIdentity = (NodeId, NodeId, EdgeType);

/// A directed, typed edge. Edges carry no properties, so at most one edge
/// exists per (source, target, type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: EdgeType,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, edge_type: EdgeType) -> Self {
        Self {
            id,
            source,
            target,
            edge_type,
        }
    }

    pub fn identity(&self) -> EdgeIdentity {
        (self.source, self.target, self.edge_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_edge_id() {
        let a = Edge::new(EdgeId::new(1), NodeId::new(3), NodeId::new(4), EdgeType::ConnectsTo);
        let b = Edge::new(EdgeId::new(9), NodeId::new(3), NodeId::new(4), EdgeType::ConnectsTo);
        let reversed = Edge::new(EdgeId::new(2), NodeId::new(4), NodeId::new(3), EdgeType::ConnectsTo);

        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), reversed.identity());
        assert_ne!(a, b);
    }
}

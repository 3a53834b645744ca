//! Core type definitions for the ingestion graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal arena identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        NodeId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

/// Internal arena identifier for an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EdgeId(pub u64);

impl EdgeId {
    pub fn new(id: u64) -> Self {
        EdgeId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

impl From<u64> for EdgeId {
    fn from(id: u64) -> Self {
        EdgeId(id)
    }
}

/// Business identity of a node: the `id` attribute carried by the source row.
///
/// System-model rows always use integer keys. Vulnerability rows may use
/// either integers or free text (`"V-12"`), so both shapes share one key space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(untagged)]
pub enum NodeKey {
    Int(i64),
    Text(String),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Int(i) => write!(f, "{}", i),
            NodeKey::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for NodeKey {
    fn from(id: i64) -> Self {
        NodeKey::Int(id)
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        NodeKey::Text(s.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self {
        NodeKey::Text(s)
    }
}

/// Node label. The set is closed: every node in the graph carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum NodeLabel {
    InternalNode,
    ExternalInterface,
    Asset,
    #[serde(rename = "TelematicsECU")]
    TelematicsEcu,
    #[serde(rename = "CANBus")]
    CanBus,
    #[serde(rename = "ECU")]
    Ecu,
    Network,
    Vulnerability,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 8] = [
        NodeLabel::InternalNode,
        NodeLabel::ExternalInterface,
        NodeLabel::Asset,
        NodeLabel::TelematicsEcu,
        NodeLabel::CanBus,
        NodeLabel::Ecu,
        NodeLabel::Network,
        NodeLabel::Vulnerability,
    ];

    /// Label as written into the datastore
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::InternalNode => "InternalNode",
            NodeLabel::ExternalInterface => "ExternalInterface",
            NodeLabel::Asset => "Asset",
            NodeLabel::TelematicsEcu => "TelematicsECU",
            NodeLabel::CanBus => "CANBus",
            NodeLabel::Ecu => "ECU",
            NodeLabel::Network => "Network",
            NodeLabel::Vulnerability => "Vulnerability",
        }
    }

    /// True for every label except `Vulnerability`
    pub fn is_system_component(&self) -> bool {
        !matches!(self, NodeLabel::Vulnerability)
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Structural edge taken from a `connects_to` reference
    ConnectsTo,
    /// Inferred edge from a component to a vulnerability on one of its interfaces
    HasVulnerability,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::ConnectsTo => "CONNECTS_TO",
            EdgeType::HasVulnerability => "HAS_VULNERABILITY",
        }
    }

    /// Label the target node must carry, if the edge type constrains it
    pub fn required_target_label(&self) -> Option<NodeLabel> {
        match self {
            EdgeType::ConnectsTo => None,
            EdgeType::HasVulnerability => Some(NodeLabel::Vulnerability),
        }
    }

    /// Can an edge of this type end on a node labelled `label`?
    /// `CONNECTS_TO` joins components only.
    pub fn accepts_target(&self, label: NodeLabel) -> bool {
        match self {
            EdgeType::ConnectsTo => label.is_system_component(),
            EdgeType::HasVulnerability => label == NodeLabel::Vulnerability,
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

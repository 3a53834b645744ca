//! Node implementation for the ingestion graph

use super::property::{PropertyMap, PropertyValue};
use super::types::{NodeId, NodeKey, NodeLabel};
use serde::{Deserialize, Serialize};

/// A node in the property graph
///
/// Nodes have:
/// - An arena ID assigned by the store
/// - A business key (the `id` of the source row), unique across the graph
/// - Exactly one label
/// - Properties (key-value pairs)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Arena identifier
    pub id: NodeId,

    /// Business key, mirrored into the `id` property
    pub key: NodeKey,

    /// Label of this node
    pub label: NodeLabel,

    /// Properties associated with this node
    pub properties: PropertyMap,
}

impl Node {
    /// Create a new node with only its `id` property set
    pub fn new(id: NodeId, label: NodeLabel, key: NodeKey) -> Self {
        let mut properties = PropertyMap::new();
        properties.insert("id".to_string(), key_property(&key));

        Node {
            id,
            key,
            label,
            properties,
        }
    }

    /// Create a new node with properties
    pub fn new_with_properties(
        id: NodeId,
        label: NodeLabel,
        key: NodeKey,
        properties: PropertyMap,
    ) -> Self {
        let mut node = Node::new(id, label, key);
        node.merge_properties(properties);
        node
    }

    /// Set a property value
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        self.properties.insert(key.into(), value.into())
    }

    /// Overwrite every property named in `properties`, keeping the others.
    /// The `id` property always mirrors the node key.
    pub fn merge_properties(&mut self, properties: PropertyMap) {
        for (key, value) in properties {
            if key == "id" {
                continue;
            }
            self.properties.insert(key, value);
        }
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

pub(crate) fn key_property(key: &NodeKey) -> PropertyValue {
    match key {
        NodeKey::Int(i) => PropertyValue::Integer(*i),
        NodeKey::Text(s) => PropertyValue::String(s.clone()),
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

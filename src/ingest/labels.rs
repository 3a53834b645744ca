//! Raw system-model type -> node label

use crate::graph::NodeLabel;
use thiserror::Error;

/// Taxonomy keys used in the system model sheet and the label each one maps to
pub const NODE_TYPE_TABLE: [(&str, NodeLabel); 7] = [
    ("INTERNAL_NODE", NodeLabel::InternalNode),
    ("EXTERNAL_NODE", NodeLabel::ExternalInterface),
    ("ASSET_NODE", NodeLabel::Asset),
    ("Telematics ECU", NodeLabel::TelematicsEcu),
    ("CAN-Bus", NodeLabel::CanBus),
    ("ECU", NodeLabel::Ecu),
    ("NETWORK", NodeLabel::Network),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown node type '{0}'")]
pub struct UnknownNodeType(pub String);

/// Exact, case-sensitive lookup in [`NODE_TYPE_TABLE`]
pub fn resolve_label(raw_type: &str) -> Result<NodeLabel, UnknownNodeType> {
    NODE_TYPE_TABLE
        .iter()
        .find(|(key, _)| *key == raw_type)
        .map(|(_, label)| *label)
        .ok_or_else(|| UnknownNodeType(raw_type.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_key_resolves() {
        for (key, label) in NODE_TYPE_TABLE {
            assert_eq!(resolve_label(key), Ok(label));
        }
    }

    #[test]
    fn test_table_never_yields_vulnerability() {
        assert!(NODE_TYPE_TABLE
            .iter()
            .all(|(_, label)| label.is_system_component()));
        assert!(resolve_label("Vulnerability").is_err());
    }

    #[test]
    fn test_unknown_types() {
        for raw in ["", "ecu", "CAN Bus", " ECU", "GATEWAY"] {
            assert_eq!(resolve_label(raw), Err(UnknownNodeType(raw.to_string())));
        }
    }
}

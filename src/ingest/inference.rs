//! Component -> vulnerability link inference
//!
//! A component is linked to every vulnerability whose interface field
//! mentions one of the component's interface tokens. In the default
//! [`MatchMode::Substring`] mode the test is an unanchored, case-sensitive
//! substring search on the raw field, so `CAN` also matches `CANBus-diag`.

use crate::config::MatchMode;
use crate::graph::NodeKey;
use crate::model::VulnerabilityRecord;
use indexmap::IndexSet;

/// Does `vulnerability` affect an interface named `token`?
pub fn interface_matches(token: &str, vulnerability: &VulnerabilityRecord, mode: MatchMode) -> bool {
    match mode {
        MatchMode::Substring => vulnerability.interfaces.raw().contains(token),
        MatchMode::Token => vulnerability
            .interfaces
            .tokens()
            .iter()
            .any(|candidate| candidate == token),
    }
}

/// IDs of the vulnerabilities linked to a component with `interfaces`.
///
/// Ordered by first match (interface order, then catalog order) with
/// duplicates removed, so the same inputs always give the same edges.
pub fn infer_vulnerability_links(
    interfaces: &[String],
    vulnerabilities: &[VulnerabilityRecord],
    mode: MatchMode,
) -> Vec<NodeKey> {
    let mut links: IndexSet<&NodeKey> = IndexSet::new();
    for token in interfaces {
        for vulnerability in vulnerabilities {
            if interface_matches(token, vulnerability, mode) {
                links.insert(&vulnerability.id);
            }
        }
    }
    links.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<VulnerabilityRecord> {
        vec![
            VulnerabilityRecord::new(0, "V1").with_interfaces("CAN,LIN"),
            VulnerabilityRecord::new(1, "V2").with_interfaces("Bluetooth"),
            VulnerabilityRecord::new(2, "V3").with_interfaces("CANBus-diag"),
            VulnerabilityRecord::new(3, "V4"),
        ]
    }

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_substring_match() {
        let links = infer_vulnerability_links(&tokens(&["CAN"]), &catalog(), MatchMode::Substring);
        // V3 matches through the unanchored substring test
        assert_eq!(links, vec![NodeKey::from("V1"), NodeKey::from("V3")]);
    }

    #[test]
    fn test_no_match() {
        let links =
            infer_vulnerability_links(&tokens(&["Ethernet"]), &catalog(), MatchMode::Substring);
        assert!(links.is_empty());
        assert!(infer_vulnerability_links(&[], &catalog(), MatchMode::Substring).is_empty());
    }

    #[test]
    fn test_case_sensitive() {
        let links = infer_vulnerability_links(&tokens(&["can"]), &catalog(), MatchMode::Substring);
        assert!(links.is_empty());
    }

    #[test]
    fn test_duplicates_collapse_in_first_match_order() {
        let links = infer_vulnerability_links(
            &tokens(&["Bluetooth", "LIN", "CAN"]),
            &catalog(),
            MatchMode::Substring,
        );
        assert_eq!(
            links,
            vec![NodeKey::from("V2"), NodeKey::from("V1"), NodeKey::from("V3")]
        );
    }

    #[test]
    fn test_token_mode_is_exact() {
        let links = infer_vulnerability_links(&tokens(&["CAN"]), &catalog(), MatchMode::Token);
        assert_eq!(links, vec![NodeKey::from("V1")]);
    }

    #[test]
    fn test_deterministic() {
        let interfaces = tokens(&["LIN", "CAN", "Bluetooth"]);
        let first = infer_vulnerability_links(&interfaces, &catalog(), MatchMode::Substring);
        let second = infer_vulnerability_links(&interfaces, &catalog(), MatchMode::Substring);
        assert_eq!(first, second);
    }
}

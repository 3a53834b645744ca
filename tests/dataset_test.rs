use std::fs;
use tempfile::tempdir;
use vulngraph::backend::MemoryBackend;
use vulngraph::config::{IngestConfig, MatchMode};
use vulngraph::graph::{EdgeType, NodeKey, NodeLabel};
use vulngraph::ingest::{Ingestor, Phase};
use vulngraph::source::{load_dataset, SourceError};

const WORKBOOK_JSON: &str = r#"{
  "system_model": [
    {"Type": "Telematics ECU", "Category": "Connectivity", "ID": 1.0, "Name": "TCU",
     "Priv": "root", "Interface": "LTE, CAN", "scr_ref": "S-1", "des_ref": null,
     "Connects_to": "2"},
    {"Type": "CAN-Bus", "ID": 2, "Name": "Powertrain CAN", "Interface": "CAN",
     "Connects_to": 1},
    {"Type": "ECU", "ID": "three", "Name": "Broken row"},
    {"Type": "NETWORK", "ID": 4, "Name": "Backend", "Interface": "LTE",
     "Connects_to": "1, 77"}
  ],
  "vulnerabilities": [
    {"Type": "Remote", "ID": "V1", "Description": "Modem RCE", "CWE_number": "CWE-787",
     "CVSSv3": 9.8, "Interface": "LTE", "Attack_Class": "RCE"},
    {"Type": "Local", "ID": 101, "Description": "Frame injection", "Interface": "CAN,LIN"},
    {"Type": "Local", "Description": "No identifier"}
  ]
}"#;

#[test]
fn test_json_dataset_end_to_end() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vehicle.json");
    fs::write(&path, WORKBOOK_JSON).unwrap();

    let dataset = load_dataset(&path).unwrap();
    assert_eq!(dataset.system_model.len(), 3);
    assert_eq!(dataset.vulnerabilities.len(), 2);
    assert_eq!(dataset.rejected.len(), 2);

    let mut backend = MemoryBackend::new();
    let report = Ingestor::default().run(&mut backend, &dataset).unwrap();

    // rejected rows surface as failures of their phase
    assert_eq!(report.vulnerabilities.failed, 1);
    assert_eq!(report.vulnerabilities.failures().next().unwrap().row_index, 2);
    let broken = report.system_model.failures().next().unwrap();
    assert_eq!(broken.phase, Phase::SystemModel);
    assert_eq!(broken.row_index, 2);
    assert_eq!(broken.id.as_deref(), Some("three"));
    assert_eq!(report.system_model.succeeded, 3);

    let store = backend.store();
    let tcu = store.find_node(&NodeKey::Int(1)).unwrap();
    assert_eq!(tcu.label, NodeLabel::TelematicsEcu);
    assert_eq!(tcu.get_property("priv").unwrap().as_string(), Some("root"));

    let cve = store.find_node(&NodeKey::from("V1")).unwrap();
    assert_eq!(cve.get_property("cvssv3").unwrap().as_float(), Some(9.8));
    assert_eq!(
        store.find_node(&NodeKey::Int(101)).unwrap().label,
        NodeLabel::Vulnerability
    );

    assert_eq!(
        store.neighbours(&NodeKey::Int(1), EdgeType::HasVulnerability),
        vec![&NodeKey::from("V1"), &NodeKey::Int(101)]
    );
    assert_eq!(
        store.neighbours(&NodeKey::Int(4), EdgeType::ConnectsTo),
        vec![&NodeKey::Int(1)]
    );
    assert_eq!(report.system_model.unresolved.len(), 1);
    assert_eq!(report.system_model.unresolved[0].to, NodeKey::Int(77));
}

#[test]
fn test_yaml_dataset() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vehicle.yml");
    fs::write(
        &path,
        "system_model:\n  - {Type: ECU, ID: 1, Interface: 'CAN, 5'}\nvulnerabilities:\n  - {ID: V1, Interface: CANBus-diag}\n  - {ID: V2, Interface: 5}\n",
    )
    .unwrap();

    let dataset = load_dataset(&path).unwrap();
    assert!(dataset.rejected.is_empty());
    assert_eq!(dataset.vulnerabilities[0].id, NodeKey::from("V1"));
    assert!(dataset.vulnerabilities[1].interfaces.is_empty());

    let config = IngestConfig {
        interface_match: MatchMode::Token,
        ..Default::default()
    };
    let mut backend = MemoryBackend::new();
    let report = Ingestor::new(config).run(&mut backend, &dataset).unwrap();
    // neither the substring nor the numeric cell counts as a match
    assert_eq!(report.system_model.edges_created, 0);
}

#[test]
fn test_config_file_and_unsupported_dataset() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("ingest.yaml");
    fs::write(
        &config_path,
        "interface_match: token\ndefer_forward_references: false\n",
    )
    .unwrap();
    let config = IngestConfig::from_yaml_file(&config_path).unwrap();
    assert_eq!(config.interface_match, MatchMode::Token);
    assert!(!config.defer_forward_references);

    let csv = dir.path().join("vehicle.csv");
    fs::write(&csv, "ID,Type\n1,ECU\n").unwrap();
    assert!(matches!(
        load_dataset(&csv),
        Err(SourceError::UnsupportedFormat(ext)) if ext == "csv"
    ));
}

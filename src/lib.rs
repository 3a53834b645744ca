//! vulngraph
//!
//! Builds a security knowledge graph of a vehicle's system architecture and
//! its known vulnerabilities, for attack-path analysis.
//!
//! # Architecture
//!
//! - [`source`]: dataset loading; raw spreadsheet rows are converted once
//!   into the typed records of [`model`]
//! - [`ingest`]: the two ingestion phases, label resolution, and
//!   component -> vulnerability link inference
//! - [`backend`]: the transactional [`GraphBackend`] interface with an
//!   in-memory and a Cypher script implementation
//! - [`graph`]: the in-memory property graph behind [`MemoryBackend`]
//!
//! # Graph model
//!
//! - Component nodes labelled `InternalNode`, `ExternalInterface`, `Asset`,
//!   `TelematicsECU`, `CANBus`, `ECU` or `Network`
//! - `Vulnerability` nodes, one per catalog entry
//! - `CONNECTS_TO` edges between components
//! - `HAS_VULNERABILITY` edges from a component to each vulnerability
//!   whose interface field mentions one of the component's interfaces
//!
//! ## Example Usage
//!
//! ```rust
//! use vulngraph::graph::{EdgeType, NodeKey};
//! use vulngraph::model::{SystemModelRecord, VulnerabilityRecord};
//! use vulngraph::{Dataset, IngestConfig, Ingestor, MemoryBackend};
//!
//! let dataset = Dataset::new(
//!     vec![
//!         SystemModelRecord::new(0, 1, "ECU").with_interfaces("CAN").with_connects_to([2]),
//!         SystemModelRecord::new(1, 2, "CAN-Bus"),
//!     ],
//!     vec![VulnerabilityRecord::new(0, "V1").with_interfaces("CAN,LIN")],
//! );
//!
//! let mut backend = MemoryBackend::new();
//! let report = Ingestor::new(IngestConfig::default())
//!     .run(&mut backend, &dataset)
//!     .unwrap();
//! assert!(report.is_clean());
//!
//! let linked = backend
//!     .store()
//!     .neighbours(&NodeKey::Int(1), EdgeType::HasVulnerability);
//! assert_eq!(linked, vec![&NodeKey::from("V1")]);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod graph;
pub mod ingest;
pub mod model;
pub mod source;

// Re-export main types for convenience
pub use backend::{
    BackendError, BackendResult, CypherScriptBackend, EdgeMerge, GraphBackend, MemoryBackend,
    Upserted,
};

pub use config::{ConfigError, IdCollisionPolicy, IngestConfig, MatchMode};

pub use graph::{EdgeType, GraphError, GraphSnapshot, GraphStore, NodeKey, NodeLabel, PropertyValue};

pub use ingest::{IngestError, IngestReport, IngestResult, Ingestor, Phase, PhaseReport};

pub use model::{RecordError, SystemModelRecord, VulnerabilityRecord};

pub use source::{load_dataset, Dataset, SourceError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

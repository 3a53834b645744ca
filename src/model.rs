//! Typed input records
//!
//! Raw rows arrive with the spreadsheet column names and loosely typed cells.
//! They are converted once, at the loading boundary, into
//! [`SystemModelRecord`] and [`VulnerabilityRecord`]; ingestion code never
//! looks at raw cells again.

use crate::graph::{NodeKey, PropertyMap, PropertyValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting a raw row into a typed record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("missing ID")]
    MissingId,

    #[error("invalid ID {0}")]
    InvalidId(String),

    #[error("invalid Connects_to reference '{0}'")]
    InvalidReference(String),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Split a comma-separated interface field into trimmed, non-empty tokens
pub fn tokenize_interfaces(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// An interface field: the raw text as given and its tokens.
///
/// Inference matches against `raw`; nodes store `tokens`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceList {
    raw: String,
    tokens: Vec<String>,
}

impl InterfaceList {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let tokens = tokenize_interfaces(&raw);
        Self { raw, tokens }
    }

    /// Interface list of a cell. Only text cells list interfaces; a
    /// number in the column matches nothing.
    pub fn from_cell(cell: Option<&PropertyValue>) -> Self {
        match cell {
            Some(PropertyValue::String(s)) => Self::parse(s.as_str()),
            _ => Self::default(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A component of the system architecture model
#[derive(Debug, Clone, PartialEq)]
pub struct SystemModelRecord {
    /// Position of the row in its source sheet
    pub row_index: usize,
    pub id: i64,
    pub name: PropertyValue,
    /// Raw taxonomy key, resolved to a label during ingestion
    pub node_type: String,
    pub category: PropertyValue,
    pub privilege: PropertyValue,
    pub interfaces: InterfaceList,
    pub scr_ref: PropertyValue,
    pub des_ref: PropertyValue,
    pub connects_to: Vec<i64>,
}

impl SystemModelRecord {
    pub fn new(row_index: usize, id: i64, node_type: impl Into<String>) -> Self {
        Self {
            row_index,
            id,
            name: PropertyValue::Null,
            node_type: node_type.into(),
            category: PropertyValue::Null,
            privilege: PropertyValue::Null,
            interfaces: InterfaceList::default(),
            scr_ref: PropertyValue::Null,
            des_ref: PropertyValue::Null,
            connects_to: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<PropertyValue>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_interfaces(mut self, raw: &str) -> Self {
        self.interfaces = InterfaceList::parse(raw);
        self
    }

    pub fn with_connects_to(mut self, targets: impl IntoIterator<Item = i64>) -> Self {
        self.connects_to = targets.into_iter().collect();
        self
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::Int(self.id)
    }

    /// Name for log lines; falls back to the ID
    pub fn display_name(&self) -> String {
        self.name.to_text().unwrap_or_else(|| self.id.to_string())
    }

    /// Node properties, in the attribute order of the graph schema
    pub fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), self.name.clone());
        props.insert("priv".to_string(), self.privilege.clone());
        props.insert("interfaces".to_string(), self.interfaces.tokens().into());
        props.insert("scr_ref".to_string(), self.scr_ref.clone());
        props.insert("des_ref".to_string(), self.des_ref.clone());
        props.insert("category".to_string(), self.category.clone());
        props
    }
}

/// A vulnerability catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct VulnerabilityRecord {
    pub row_index: usize,
    pub id: NodeKey,
    pub vuln_type: PropertyValue,
    pub prev_step: PropertyValue,
    pub description: PropertyValue,
    pub vulnerability: PropertyValue,
    pub cwe_number: PropertyValue,
    pub cvssv3: PropertyValue,
    pub privilege_needed: PropertyValue,
    pub privilege_acquired: PropertyValue,
    pub component: PropertyValue,
    pub interfaces: InterfaceList,
    pub attack_class: PropertyValue,
    pub target: PropertyValue,
}

impl VulnerabilityRecord {
    pub fn new(row_index: usize, id: impl Into<NodeKey>) -> Self {
        Self {
            row_index,
            id: id.into(),
            vuln_type: PropertyValue::Null,
            prev_step: PropertyValue::Null,
            description: PropertyValue::Null,
            vulnerability: PropertyValue::Null,
            cwe_number: PropertyValue::Null,
            cvssv3: PropertyValue::Null,
            privilege_needed: PropertyValue::Null,
            privilege_acquired: PropertyValue::Null,
            component: PropertyValue::Null,
            interfaces: InterfaceList::default(),
            attack_class: PropertyValue::Null,
            target: PropertyValue::Null,
        }
    }

    pub fn with_interfaces(mut self, raw: &str) -> Self {
        self.interfaces = InterfaceList::parse(raw);
        self
    }

    pub fn with_description(mut self, description: impl Into<PropertyValue>) -> Self {
        self.description = description.into();
        self
    }

    pub fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("type".to_string(), self.vuln_type.clone());
        props.insert("prev_step".to_string(), self.prev_step.clone());
        props.insert("description".to_string(), self.description.clone());
        props.insert("vulnerability".to_string(), self.vulnerability.clone());
        props.insert("cwe_number".to_string(), self.cwe_number.clone());
        props.insert("cvssv3".to_string(), self.cvssv3.clone());
        props.insert("privilege_needed".to_string(), self.privilege_needed.clone());
        props.insert("privilege_acquired".to_string(), self.privilege_acquired.clone());
        props.insert("component".to_string(), self.component.clone());
        props.insert("interfaces".to_string(), self.interfaces.tokens().into());
        props.insert("attack_class".to_string(), self.attack_class.clone());
        props.insert("target".to_string(), self.target.clone());
        props
    }
}

/// System model row as it comes out of the `Sys_model` sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSystemRow {
    #[serde(rename = "Type")]
    pub node_type: Option<PropertyValue>,
    #[serde(rename = "Category")]
    pub category: Option<PropertyValue>,
    #[serde(rename = "ID")]
    pub id: Option<PropertyValue>,
    #[serde(rename = "Name")]
    pub name: Option<PropertyValue>,
    #[serde(rename = "Priv")]
    pub privilege: Option<PropertyValue>,
    #[serde(rename = "Interface")]
    pub interface: Option<PropertyValue>,
    pub scr_ref: Option<PropertyValue>,
    pub des_ref: Option<PropertyValue>,
    #[serde(rename = "Connects_to")]
    pub connects_to: Option<PropertyValue>,
}

/// Vulnerability row as it comes out of the `Vul_desc` sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawVulnerabilityRow {
    #[serde(rename = "Type")]
    pub vuln_type: Option<PropertyValue>,
    #[serde(rename = "ID")]
    pub id: Option<PropertyValue>,
    #[serde(rename = "Prev_Step")]
    pub prev_step: Option<PropertyValue>,
    #[serde(rename = "Description")]
    pub description: Option<PropertyValue>,
    #[serde(rename = "Vulnerability")]
    pub vulnerability: Option<PropertyValue>,
    #[serde(rename = "CWE_number")]
    pub cwe_number: Option<PropertyValue>,
    #[serde(rename = "CVSSv3")]
    pub cvssv3: Option<PropertyValue>,
    #[serde(rename = "Privilege_needed")]
    pub privilege_needed: Option<PropertyValue>,
    #[serde(rename = "Privilege_acquired")]
    pub privilege_acquired: Option<PropertyValue>,
    #[serde(rename = "Component")]
    pub component: Option<PropertyValue>,
    #[serde(rename = "Interface")]
    pub interface: Option<PropertyValue>,
    #[serde(rename = "Attack_Class")]
    pub attack_class: Option<PropertyValue>,
    #[serde(rename = "Target")]
    pub target: Option<PropertyValue>,
}

impl RawSystemRow {
    /// ID as text for diagnostics, even when it fails to parse
    pub fn id_text(&self) -> Option<String> {
        self.id.as_ref().and_then(PropertyValue::to_text)
    }

    pub fn into_record(self, row_index: usize) -> RecordResult<SystemModelRecord> {
        let id = parse_integer_id(self.id.as_ref())?;
        let connects_to = parse_references(self.connects_to.as_ref())?;
        Ok(SystemModelRecord {
            row_index,
            id,
            name: cell(self.name),
            node_type: self
                .node_type
                .as_ref()
                .and_then(PropertyValue::to_text)
                .unwrap_or_default(),
            category: cell(self.category),
            privilege: cell(self.privilege),
            interfaces: InterfaceList::from_cell(self.interface.as_ref()),
            scr_ref: cell(self.scr_ref),
            des_ref: cell(self.des_ref),
            connects_to,
        })
    }
}

impl RawVulnerabilityRow {
    pub fn id_text(&self) -> Option<String> {
        self.id.as_ref().and_then(PropertyValue::to_text)
    }

    pub fn into_record(self, row_index: usize) -> RecordResult<VulnerabilityRecord> {
        let id = parse_key(self.id.as_ref())?;
        Ok(VulnerabilityRecord {
            row_index,
            id,
            vuln_type: cell(self.vuln_type),
            prev_step: cell(self.prev_step),
            description: cell(self.description),
            vulnerability: cell(self.vulnerability),
            cwe_number: cell(self.cwe_number),
            cvssv3: cell(self.cvssv3),
            privilege_needed: cell(self.privilege_needed),
            privilege_acquired: cell(self.privilege_acquired),
            component: cell(self.component),
            interfaces: InterfaceList::from_cell(self.interface.as_ref()),
            attack_class: cell(self.attack_class),
            target: cell(self.target),
        })
    }
}

fn cell(value: Option<PropertyValue>) -> PropertyValue {
    value.unwrap_or(PropertyValue::Null)
}

/// Integral float cells (`3.0`) are what spreadsheet exports produce for integer columns
fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn parse_integer_id(value: Option<&PropertyValue>) -> RecordResult<i64> {
    match value {
        None | Some(PropertyValue::Null) => Err(RecordError::MissingId),
        Some(PropertyValue::Integer(i)) => Ok(*i),
        Some(PropertyValue::Float(f)) => {
            integral(*f).ok_or_else(|| RecordError::InvalidId(f.to_string()))
        }
        Some(PropertyValue::String(s)) if s.trim().is_empty() => Err(RecordError::MissingId),
        Some(PropertyValue::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| RecordError::InvalidId(s.clone())),
        Some(other) => Err(RecordError::InvalidId(other.to_string())),
    }
}

fn parse_key(value: Option<&PropertyValue>) -> RecordResult<NodeKey> {
    match value {
        None | Some(PropertyValue::Null) => Err(RecordError::MissingId),
        Some(PropertyValue::Integer(i)) => Ok(NodeKey::Int(*i)),
        Some(PropertyValue::Float(f)) => integral(*f)
            .map(NodeKey::Int)
            .ok_or_else(|| RecordError::InvalidId(f.to_string())),
        Some(PropertyValue::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(RecordError::MissingId);
            }
            Ok(trimmed
                .parse::<i64>()
                .map(NodeKey::Int)
                .unwrap_or_else(|_| NodeKey::Text(trimmed.to_string())))
        }
        Some(other) => Err(RecordError::InvalidId(other.to_string())),
    }
}

fn parse_references(value: Option<&PropertyValue>) -> RecordResult<Vec<i64>> {
    match value {
        None | Some(PropertyValue::Null) => Ok(Vec::new()),
        Some(PropertyValue::Integer(i)) => Ok(vec![*i]),
        Some(PropertyValue::Float(f)) => integral(*f)
            .map(|i| vec![i])
            .ok_or_else(|| RecordError::InvalidReference(f.to_string())),
        Some(PropertyValue::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                token
                    .parse::<i64>()
                    .map_err(|_| RecordError::InvalidReference(token.to_string()))
            })
            .collect(),
        Some(other) => Err(RecordError::InvalidReference(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_interfaces() {
        assert_eq!(
            tokenize_interfaces("CAN-H, CAN-L ,Diag"),
            vec!["CAN-H", "CAN-L", "Diag"]
        );
        assert_eq!(tokenize_interfaces("CAN,,  ,LIN"), vec!["CAN", "LIN"]);
        assert!(tokenize_interfaces("").is_empty());
        assert!(tokenize_interfaces("   ").is_empty());
    }

    #[test]
    fn test_interface_list_keeps_raw_text() {
        let list = InterfaceList::parse(" CAN , OBD-II");
        assert_eq!(list.raw(), " CAN , OBD-II");
        assert_eq!(list.tokens(), ["CAN", "OBD-II"]);
        assert!(InterfaceList::from_cell(None).is_empty());
        assert!(InterfaceList::from_cell(Some(&PropertyValue::Null)).is_empty());
    }

    #[test]
    fn test_numeric_interface_cell_lists_nothing() {
        let list = InterfaceList::from_cell(Some(&PropertyValue::Integer(5)));
        assert!(list.is_empty());
        assert_eq!(list.raw(), "");
        assert!(InterfaceList::from_cell(Some(&PropertyValue::Float(2.0))).is_empty());
    }

    #[test]
    fn test_system_row_conversion() {
        let raw: RawSystemRow = serde_json::from_str(
            r#"{"Type": "ECU", "Category": "Body", "ID": 3.0, "Name": "BCM",
                "Priv": "user", "Interface": "CAN, LIN", "scr_ref": "S1",
                "des_ref": null, "Connects_to": "1, 2"}"#,
        )
        .unwrap();
        let record = raw.into_record(7).unwrap();

        assert_eq!(record.row_index, 7);
        assert_eq!(record.id, 3);
        assert_eq!(record.node_type, "ECU");
        assert_eq!(record.interfaces.tokens(), ["CAN", "LIN"]);
        assert_eq!(record.connects_to, vec![1, 2]);
        assert!(record.des_ref.is_null());
        assert_eq!(record.display_name(), "BCM");
    }

    #[test]
    fn test_system_row_missing_fields() {
        let raw: RawSystemRow = serde_json::from_str(r#"{"ID": "12"}"#).unwrap();
        let record = raw.into_record(0).unwrap();
        assert_eq!(record.id, 12);
        assert_eq!(record.node_type, "");
        assert!(record.connects_to.is_empty());
        assert!(record.interfaces.is_empty());
        assert_eq!(record.display_name(), "12");
    }

    #[test]
    fn test_system_row_rejections() {
        let missing: RawSystemRow = serde_json::from_str(r#"{"Type": "ECU"}"#).unwrap();
        assert_eq!(missing.into_record(0), Err(RecordError::MissingId));

        let bad_id: RawSystemRow = serde_json::from_str(r#"{"ID": "ecu-1"}"#).unwrap();
        assert_eq!(
            bad_id.into_record(0),
            Err(RecordError::InvalidId("ecu-1".to_string()))
        );

        let bad_ref: RawSystemRow =
            serde_json::from_str(r#"{"ID": 1, "Connects_to": "2, x"}"#).unwrap();
        assert_eq!(
            bad_ref.into_record(0),
            Err(RecordError::InvalidReference("x".to_string()))
        );
    }

    #[test]
    fn test_single_numeric_reference() {
        let raw: RawSystemRow = serde_json::from_str(r#"{"ID": 1, "Connects_to": 4.0}"#).unwrap();
        assert_eq!(raw.into_record(0).unwrap().connects_to, vec![4]);
    }

    #[test]
    fn test_vulnerability_keys() {
        let text: RawVulnerabilityRow =
            serde_json::from_str(r#"{"ID": " V-12 ", "Interface": "Bluetooth"}"#).unwrap();
        let record = text.into_record(0).unwrap();
        assert_eq!(record.id, NodeKey::from("V-12"));
        assert_eq!(record.interfaces.raw(), "Bluetooth");

        let numeric: RawVulnerabilityRow = serde_json::from_str(r#"{"ID": "101"}"#).unwrap();
        assert_eq!(numeric.into_record(0).unwrap().id, NodeKey::Int(101));
    }

    #[test]
    fn test_vulnerability_properties_order() {
        let record = VulnerabilityRecord::new(0, 5i64)
            .with_interfaces("CAN,LIN")
            .with_description("Spoofed frames");
        let props = record.properties();
        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "type",
                "prev_step",
                "description",
                "vulnerability",
                "cwe_number",
                "cvssv3",
                "privilege_needed",
                "privilege_acquired",
                "component",
                "interfaces",
                "attack_class",
                "target"
            ]
        );
        assert_eq!(props["interfaces"].as_array().unwrap().len(), 2);
    }
}

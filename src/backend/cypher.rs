//! Cypher script backend
//!
//! Renders every upsert and edge merge as a Cypher statement with inline
//! literals. Statements of one transaction are buffered and written as a
//! `:begin` / `:commit` block on commit, so the output can be replayed with
//! `cypher-shell -f`. A rolled back transaction writes nothing.
//!
//! The backend remembers which keys and edges it has emitted, so it reports
//! unresolved and existing edges exactly like the in-memory backend.

use super::{BackendError, BackendResult, EdgeMerge, GraphBackend, Upserted};
use crate::graph::{EdgeType, GraphError, NodeKey, NodeLabel, PropertyMap, PropertyValue};
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::Write;
use tracing::debug;

#[derive(Debug, Default)]
struct PendingTransaction {
    statements: Vec<String>,
    nodes: Vec<(NodeKey, NodeLabel)>,
    edges: Vec<(NodeKey, NodeKey, EdgeType)>,
}

/// Backend producing a Cypher script
pub struct CypherScriptBackend<W: Write> {
    out: W,
    nodes: FxHashMap<NodeKey, NodeLabel>,
    edges: FxHashSet<(NodeKey, NodeKey, EdgeType)>,
    pending: Option<PendingTransaction>,
    statements_written: usize,
    closed: bool,
}

impl<W: Write> CypherScriptBackend<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            nodes: FxHashMap::default(),
            edges: FxHashSet::default(),
            pending: None,
            statements_written: 0,
            closed: false,
        }
    }

    /// Number of statements flushed by committed transactions
    pub fn statements_written(&self) -> usize {
        self.statements_written
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn pending(&mut self) -> BackendResult<&mut PendingTransaction> {
        if self.closed {
            return Err(BackendError::Connection("cypher script is closed".to_string()));
        }
        self.pending
            .as_mut()
            .ok_or(BackendError::TransactionState("no open transaction"))
    }

    /// Label a key resolves to, including writes of the open transaction
    fn label_of(&self, key: &NodeKey) -> Option<NodeLabel> {
        if let Some(label) = self.nodes.get(key) {
            return Some(*label);
        }
        self.pending
            .as_ref()?
            .nodes
            .iter()
            .find(|(pending_key, _)| pending_key == key)
            .map(|(_, label)| *label)
    }

    fn has_edge(&self, edge: &(NodeKey, NodeKey, EdgeType)) -> bool {
        self.edges.contains(edge)
            || self
                .pending
                .as_ref()
                .is_some_and(|tx| tx.edges.contains(edge))
    }
}

impl<W: Write> GraphBackend for CypherScriptBackend<W> {
    fn name(&self) -> &'static str {
        "cypher"
    }

    fn begin(&mut self) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Connection("cypher script is closed".to_string()));
        }
        if self.pending.is_some() {
            return Err(BackendError::TransactionState("transaction already open"));
        }
        self.pending = Some(PendingTransaction::default());
        Ok(())
    }

    fn commit(&mut self) -> BackendResult<()> {
        self.pending()?;
        let Some(tx) = self.pending.take() else {
            return Err(BackendError::TransactionState("no open transaction"));
        };
        if tx.statements.is_empty() {
            return Ok(());
        }

        writeln!(self.out, ":begin")?;
        for statement in &tx.statements {
            writeln!(self.out, "{};", statement)?;
        }
        writeln!(self.out, ":commit")?;

        self.statements_written += tx.statements.len();
        self.nodes.extend(tx.nodes);
        self.edges.extend(tx.edges);
        Ok(())
    }

    fn rollback(&mut self) -> BackendResult<()> {
        let tx = std::mem::take(self.pending()?);
        self.pending = None;
        debug!(statements = tx.statements.len(), "discarding cypher transaction");
        Ok(())
    }

    fn upsert_node(
        &mut self,
        label: NodeLabel,
        key: &NodeKey,
        properties: PropertyMap,
    ) -> BackendResult<Upserted> {
        self.pending()?;
        let existing = self.label_of(key);
        if let Some(existing) = existing {
            if existing != label {
                return Err(GraphError::LabelConflict {
                    key: key.clone(),
                    existing,
                    requested: label,
                }
                .into());
            }
        }

        let statement = render_upsert(label, key, &properties);
        let tx = self.pending()?;
        tx.statements.push(statement);
        if existing.is_some() {
            return Ok(Upserted::Updated);
        }
        tx.nodes.push((key.clone(), label));
        Ok(Upserted::Created)
    }

    fn merge_edge(
        &mut self,
        edge_type: EdgeType,
        from: &NodeKey,
        to: &NodeKey,
    ) -> BackendResult<EdgeMerge> {
        self.pending()?;
        if self.label_of(from).is_none() {
            return Ok(EdgeMerge::Unresolved);
        }
        let Some(target_label) = self.label_of(to) else {
            return Ok(EdgeMerge::Unresolved);
        };
        if !edge_type.accepts_target(target_label) {
            return Ok(EdgeMerge::Unresolved);
        }

        let edge = (from.clone(), to.clone(), edge_type);
        if self.has_edge(&edge) {
            return Ok(EdgeMerge::Existing);
        }

        let statement = render_edge_merge(edge_type, from, to);
        let tx = self.pending()?;
        tx.statements.push(statement);
        tx.edges.push(edge);
        Ok(EdgeMerge::Created)
    }

    fn close(&mut self) -> BackendResult<()> {
        if self.closed {
            return Ok(());
        }
        self.pending = None;
        self.closed = true;
        self.out.flush()?;
        Ok(())
    }
}

/// `MERGE (n:Label {id: key}) SET n.a = .., n.b = ..`
pub fn render_upsert(label: NodeLabel, key: &NodeKey, properties: &PropertyMap) -> String {
    let mut statement = format!("MERGE (n:{} {{id: {}}})", label, render_key(key));
    let assignments: Vec<String> = properties
        .iter()
        .filter(|(name, _)| name.as_str() != "id")
        .map(|(name, value)| format!("n.{} = {}", name, render_literal(value)))
        .collect();
    if !assignments.is_empty() {
        statement.push_str(" SET ");
        statement.push_str(&assignments.join(", "));
    }
    statement
}

/// `MATCH (a {id: from}), (b[:Label] {id: to}) [WHERE ..] MERGE (a)-[:TYPE]->(b)`
pub fn render_edge_merge(edge_type: EdgeType, from: &NodeKey, to: &NodeKey) -> String {
    let (target_label, target_filter) = match edge_type.required_target_label() {
        Some(label) => (format!(":{}", label), String::new()),
        None => (
            String::new(),
            format!(" WHERE NOT b:{}", NodeLabel::Vulnerability),
        ),
    };
    format!(
        "MATCH (a {{id: {}}}), (b{} {{id: {}}}){} MERGE (a)-[:{}]->(b)",
        render_key(from),
        target_label,
        render_key(to),
        target_filter,
        edge_type
    )
}

fn render_key(key: &NodeKey) -> String {
    match key {
        NodeKey::Int(i) => i.to_string(),
        NodeKey::Text(s) => quote(s),
    }
}

/// Cypher literal for a property value
pub fn render_literal(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(s) => quote(s),
        PropertyValue::Integer(i) => i.to_string(),
        PropertyValue::Float(f) if f.is_finite() => {
            let text = f.to_string();
            if text.contains(['.', 'e', 'E']) {
                text
            } else {
                format!("{}.0", text)
            }
        }
        PropertyValue::Float(_) => "null".to_string(),
        PropertyValue::Boolean(b) => b.to_string(),
        PropertyValue::Array(items) => {
            let rendered: Vec<String> = items.iter().map(render_literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        PropertyValue::Null => "null".to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for c in s.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

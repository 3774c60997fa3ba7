//! In-process property graph with the same merge semantics as the Cypher backends.
//!
//! Backs `--backend memory` dry runs and the test suite.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{BatchStatement, ConstraintOutcome, Counts, ExecutorError, GraphExecutor};
use crate::schema::{Direction, EntityDescriptor, KEY_PROPERTY};

type NodeId = (&'static str, String);

#[derive(Debug, Default)]
struct MemoryGraph {
    nodes: BTreeMap<NodeId, Map<String, Value>>,
    /// `(type, start, end)`; a set, so parallel edges of one type cannot exist.
    relationships: BTreeSet<(&'static str, NodeId, NodeId)>,
    constraints: BTreeSet<&'static str>,
    write_calls: usize,
    closed: bool,
}

/// Cloning shares the underlying graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutor {
    graph: Arc<Mutex<MemoryGraph>>,
}

struct ParsedRow<'a> {
    key: &'a str,
    props: Option<&'a Map<String, Value>>,
    links: Option<&'a Map<String, Value>>,
}

fn parse_row(row: &Value) -> Result<ParsedRow<'_>, ExecutorError> {
    let key = row
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| ExecutorError::Rejected(format!("cannot merge node with key {:?}", row.get("key"))))?;
    Ok(ParsedRow {
        key,
        props: row.get("props").and_then(Value::as_object),
        links: row.get("links").and_then(Value::as_object),
    })
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryGraph> {
        self.graph.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn node_count(&self, label: &str) -> usize {
        self.lock().nodes.keys().filter(|(l, _)| *l == label).count()
    }

    pub fn relationship_count(&self, rel_type: &str) -> usize {
        self.lock()
            .relationships
            .iter()
            .filter(|(t, _, _)| *t == rel_type)
            .count()
    }

    pub fn contains_node(&self, label: &str, key: &str) -> bool {
        self.lock()
            .nodes
            .keys()
            .any(|(l, k)| *l == label && k == key)
    }

    pub fn node_property(&self, label: &str, key: &str, property: &str) -> Option<Value> {
        self.lock()
            .nodes
            .iter()
            .find(|((l, k), _)| *l == label && k == key)
            .and_then(|(_, props)| props.get(property).cloned())
    }

    /// Whether `(start)-[:rel_type]->(end)` exists, nodes given as `(label, key)`.
    pub fn has_relationship(&self, rel_type: &str, start: (&str, &str), end: (&str, &str)) -> bool {
        self.lock().relationships.iter().any(|(t, s, e)| {
            *t == rel_type && s.0 == start.0 && s.1 == start.1 && e.0 == end.0 && e.1 == end.1
        })
    }

    pub fn constraint_labels(&self) -> Vec<&'static str> {
        self.lock().constraints.iter().copied().collect()
    }

    /// Number of `write_batch` calls received.
    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn apply(
        graph: &mut MemoryGraph,
        descriptor: &'static EntityDescriptor,
        row: &ParsedRow<'_>,
    ) {
        let id: NodeId = (descriptor.label, row.key.to_string());
        let node = graph.nodes.entry(id.clone()).or_insert_with(|| {
            let mut props = Map::new();
            props.insert(KEY_PROPERTY.to_string(), Value::String(row.key.to_string()));
            props
        });
        if let Some(props) = row.props {
            for (name, value) in props {
                if value.is_null() {
                    node.remove(name);
                } else {
                    node.insert(name.clone(), value.clone());
                }
            }
        }

        for link in descriptor.parents {
            let Some(parent_key) = row
                .links
                .and_then(|links| links.get(link.rel_type))
                .and_then(Value::as_str)
            else {
                continue;
            };
            let parent: NodeId = (link.parent.label(), parent_key.to_string());
            if !graph.nodes.contains_key(&parent) {
                continue;
            }
            let (start, end) = match link.direction {
                Direction::FromParent => (parent, id.clone()),
                Direction::ToParent => (id.clone(), parent),
            };
            graph.relationships.insert((link.rel_type, start, end));
        }
    }
}

#[async_trait]
impl GraphExecutor for MemoryExecutor {
    async fn ping(&self) -> Result<(), ExecutorError> {
        if self.lock().closed {
            return Err(ExecutorError::Connection("memory graph is closed".into()));
        }
        Ok(())
    }

    async fn ensure_unique_constraint(
        &self,
        descriptor: &'static EntityDescriptor,
    ) -> Result<ConstraintOutcome, ExecutorError> {
        if self.lock().constraints.insert(descriptor.label) {
            Ok(ConstraintOutcome::Created)
        } else {
            Ok(ConstraintOutcome::AlreadyExists)
        }
    }

    async fn write_batch(&self, statement: &BatchStatement) -> Result<(), ExecutorError> {
        let mut graph = self.lock();
        if graph.closed {
            return Err(ExecutorError::Connection("memory graph is closed".into()));
        }
        graph.write_calls += 1;

        // Validate everything first so a rejected batch leaves no partial writes.
        let rows = statement
            .rows
            .iter()
            .map(parse_row)
            .collect::<Result<Vec<_>, _>>()?;
        for row in &rows {
            Self::apply(&mut graph, statement.descriptor, row);
        }
        Ok(())
    }

    async fn count_nodes_by_label(&self) -> Result<Counts, ExecutorError> {
        let graph = self.lock();
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for (label, _) in graph.nodes.keys() {
            *counts.entry(*label).or_default() += 1;
        }
        Ok(counts.into_iter().map(|(l, c)| (l.to_string(), c)).collect())
    }

    async fn count_relationships_by_type(&self) -> Result<Counts, ExecutorError> {
        let graph = self.lock();
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for (rel_type, _, _) in &graph.relationships {
            *counts.entry(*rel_type).or_default() += 1;
        }
        Ok(counts.into_iter().map(|(t, c)| (t.to_string(), c)).collect())
    }

    async fn close(&self) -> Result<(), ExecutorError> {
        self.lock().closed = true;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

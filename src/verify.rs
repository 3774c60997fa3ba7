use std::collections::BTreeMap;

use log::{info, warn};
use serde::Serialize;

use crate::engine::EntitySummary;
use crate::error::{LoadError, Result};
use crate::executor::GraphExecutor;

/// Node counts per label and relationship counts per type, as the database reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub nodes: BTreeMap<String, i64>,
    pub relationships: BTreeMap<String, i64>,
}

/// A label holding fewer nodes than distinct keys were upserted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub label: &'static str,
    pub expected: usize,
    pub found: i64,
}

impl Verification {
    pub fn node_count(&self, label: &str) -> i64 {
        self.nodes.get(label).copied().unwrap_or(0)
    }

    pub fn relationship_count(&self, rel_type: &str) -> i64 {
        self.relationships.get(rel_type).copied().unwrap_or(0)
    }

    pub fn total_nodes(&self) -> i64 {
        self.nodes.values().sum()
    }

    pub fn total_relationships(&self) -> i64 {
        self.relationships.values().sum()
    }

    /// Labels whose node count falls short of what this run wrote. Nodes left
    /// over from earlier runs can only push counts up, so only shortfalls matter.
    pub fn shortfalls(&self, loaded: &[EntitySummary]) -> Vec<Shortfall> {
        loaded
            .iter()
            .filter_map(|summary| {
                let found = self.node_count(summary.label);
                (found < summary.distinct_keys as i64).then_some(Shortfall {
                    label: summary.label,
                    expected: summary.distinct_keys,
                    found,
                })
            })
            .collect()
    }

    pub fn log(&self) {
        info!("Node Counts:");
        for (label, count) in &self.nodes {
            info!("  {}: {}", label, count);
        }
        info!("  TOTAL: {}", self.total_nodes());

        info!("Relationship Counts:");
        for (rel_type, count) in &self.relationships {
            info!("  {}: {}", rel_type, count);
        }
        info!("  TOTAL: {}", self.total_relationships());
    }
}

/// Counts nodes by label and relationships by type. Read only.
pub async fn verify(executor: &dyn GraphExecutor) -> Result<Verification> {
    info!("🔍 Verifying import...");

    let nodes = executor
        .count_nodes_by_label()
        .await
        .map_err(LoadError::Verification)?;
    let relationships = executor
        .count_relationships_by_type()
        .await
        .map_err(LoadError::Verification)?;

    let mut verification = Verification::default();
    for (label, count) in nodes {
        if label.is_empty() {
            warn!("⚠️ {} node(s) without a label", count);
        }
        *verification.nodes.entry(label).or_default() += count;
    }
    for (rel_type, count) in relationships {
        *verification.relationships.entry(rel_type).or_default() += count;
    }
    Ok(verification)
}

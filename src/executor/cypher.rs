//! Cypher text generated from entity descriptors.

use std::fmt::Write;

use crate::schema::{Direction, EntityDescriptor, KEY_PROPERTY};

pub const NODE_COUNTS: &str =
    "MATCH (n) RETURN labels(n)[0] AS label, count(n) AS count ORDER BY label";

pub const RELATIONSHIP_COUNTS: &str =
    "MATCH ()-[r]->() RETURN type(r) AS type, count(r) AS count ORDER BY type";

pub const PING: &str = "RETURN 1 AS ok";

/// Counts the uniqueness constraints already covering `$label.$key`.
pub const NEO4J_KEY_CONSTRAINT_COUNT: &str = "SHOW CONSTRAINTS YIELD type, labelsOrTypes, properties \
     WHERE type IN ['UNIQUENESS', 'NODE_PROPERTY_UNIQUENESS', 'NODE_KEY'] \
     AND $label IN labelsOrTypes AND properties = [$key] \
     RETURN count(*) AS count";

/// Idempotent Neo4j uniqueness constraint.
pub fn neo4j_unique_constraint(descriptor: &EntityDescriptor) -> String {
    format!(
        "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
        descriptor.constraint_name(),
        descriptor.label,
        KEY_PROPERTY
    )
}

/// FalkorDB only enforces uniqueness over an existing exact-match index.
pub fn falkor_key_index(descriptor: &EntityDescriptor) -> String {
    format!(
        "CREATE INDEX FOR (n:{}) ON (n.{})",
        descriptor.label, KEY_PROPERTY
    )
}

pub fn falkor_unique_constraint(descriptor: &EntityDescriptor) -> String {
    format!(
        "CREATE CONSTRAINT FOR (n:{}) REQUIRE n.{} IS UNIQUE",
        descriptor.label, KEY_PROPERTY
    )
}

/// Merge-by-key upsert for one batch, plus one guarded merge per parent link.
///
/// Parents are matched optionally and independently: a missing parent only
/// drops that relationship, never the node or its other relationships.
///
/// Tests never execute this text. `MemoryExecutor` applies the same rows with
/// the same merge and per-link rules and serves as the reference model.
pub fn upsert(descriptor: &EntityDescriptor) -> String {
    let mut query = format!(
        "UNWIND $batch AS row \
         MERGE (n:{} {{{}: row.key}}) \
         SET n += row.props",
        descriptor.label, KEY_PROPERTY
    );

    for (i, link) in descriptor.parents.iter().enumerate() {
        let parent = format!("p{}", i);
        let pattern = match link.direction {
            Direction::FromParent => format!("({})-[:{}]->(n)", parent, link.rel_type),
            Direction::ToParent => format!("(n)-[:{}]->({})", link.rel_type, parent),
        };
        // writing to a String cannot fail
        let _ = write!(
            query,
            " WITH n, row \
             OPTIONAL MATCH ({p}:{label} {{{key}: row.links.{rel}}}) \
             FOREACH (_ IN CASE WHEN {p} IS NULL THEN [] ELSE [1] END | MERGE {pattern})",
            p = parent,
            label = link.parent.label(),
            key = KEY_PROPERTY,
            rel = link.rel_type,
            pattern = pattern,
        );
    }

    query
}

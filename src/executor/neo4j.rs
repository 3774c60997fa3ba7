use async_trait::async_trait;
use log::{debug, info};
use neo4rs::{query, BoltType, ConfigBuilder, Graph};
use serde_json::Value;

use super::{cypher, BatchStatement, ConstraintOutcome, Counts, ExecutorError, GraphExecutor};
use crate::config::ConnectionConfig;
use crate::schema::{EntityDescriptor, KEY_PROPERTY};

pub struct Neo4jExecutor {
    graph: Graph,
    uri: String,
}

fn driver_error(e: neo4rs::Error) -> ExecutorError {
    if matches!(e, neo4rs::Error::ConnectionError) {
        ExecutorError::Connection(e.to_string())
    } else {
        ExecutorError::classify(e.to_string())
    }
}

fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Bool(b) => BoltType::Boolean(neo4rs::BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(neo4rs::BoltInteger::new(i)),
            None => BoltType::Float(neo4rs::BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => BoltType::String(neo4rs::BoltString::new(s)),
        Value::Array(items) => BoltType::List(neo4rs::BoltList {
            value: items.iter().map(json_to_bolt).collect(),
        }),
        Value::Object(map) => BoltType::Map(neo4rs::BoltMap {
            value: map
                .iter()
                .map(|(k, v)| (neo4rs::BoltString::new(k), json_to_bolt(v)))
                .collect(),
        }),
    }
}

impl Neo4jExecutor {
    /// Connects and proves the connection with a round trip before returning.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ExecutorError> {
        info!("Connecting to Neo4j at {}...", config.uri);

        let neo_config = ConfigBuilder::default()
            .uri(config.uri.clone())
            .user(config.username.clone().unwrap_or_default())
            .password(config.password.clone().unwrap_or_default())
            .db(config.database.clone())
            .build()
            .map_err(|e| ExecutorError::Connection(format!("invalid connection settings: {}", e)))?;

        let graph = Graph::connect(neo_config).await.map_err(driver_error)?;
        let executor = Self {
            graph,
            uri: config.uri.clone(),
        };
        executor.ping().await?;

        info!("✅ Connected to Neo4j database '{}'", config.database);
        Ok(executor)
    }

    async fn fetch_counts(&self, statement: &str, name_column: &str) -> Result<Counts, ExecutorError> {
        let mut stream = self.graph.execute(query(statement)).await.map_err(driver_error)?;
        let mut counts = Vec::new();
        while let Some(row) = stream.next().await.map_err(driver_error)? {
            // Unlabelled nodes come back with a null label.
            let name = row.get::<String>(name_column).unwrap_or_default();
            let count = row
                .get::<i64>("count")
                .map_err(|e| ExecutorError::Rejected(format!("malformed count row: {}", e)))?;
            counts.push((name, count));
        }
        Ok(counts)
    }

    /// `IF NOT EXISTS` succeeds either way, so ask the catalogue first.
    async fn key_constraint_exists(&self, descriptor: &EntityDescriptor) -> Result<bool, ExecutorError> {
        let lookup = query(cypher::NEO4J_KEY_CONSTRAINT_COUNT)
            .param("label", descriptor.label)
            .param("key", KEY_PROPERTY);
        let mut stream = self.graph.execute(lookup).await.map_err(driver_error)?;
        let count = match stream.next().await.map_err(driver_error)? {
            Some(row) => row
                .get::<i64>("count")
                .map_err(|e| ExecutorError::Rejected(format!("malformed constraint row: {}", e)))?,
            None => 0,
        };
        Ok(count > 0)
    }
}

#[async_trait]
impl GraphExecutor for Neo4jExecutor {
    async fn ping(&self) -> Result<(), ExecutorError> {
        self.graph.run(query(cypher::PING)).await.map_err(driver_error)
    }

    async fn ensure_unique_constraint(
        &self,
        descriptor: &'static EntityDescriptor,
    ) -> Result<ConstraintOutcome, ExecutorError> {
        if self.key_constraint_exists(descriptor).await? {
            return Ok(ConstraintOutcome::AlreadyExists);
        }

        let statement = cypher::neo4j_unique_constraint(descriptor);
        debug!("  {}", statement);
        // Some server versions reject an equivalent constraint under another name.
        match self.graph.run(query(&statement)).await.map_err(driver_error) {
            Ok(()) => Ok(ConstraintOutcome::Created),
            Err(e) if e.is_already_exists() => Ok(ConstraintOutcome::AlreadyExists),
            Err(e) => Err(e),
        }
    }

    async fn write_batch(&self, statement: &BatchStatement) -> Result<(), ExecutorError> {
        let rows = BoltType::List(neo4rs::BoltList {
            value: statement.rows.iter().map(json_to_bolt).collect(),
        });
        let mut txn = self.graph.start_txn().await.map_err(driver_error)?;
        txn.run(query(&statement.cypher).param("batch", rows))
            .await
            .map_err(driver_error)?;
        txn.commit().await.map_err(driver_error)
    }

    async fn count_nodes_by_label(&self) -> Result<Counts, ExecutorError> {
        self.fetch_counts(cypher::NODE_COUNTS, "label").await
    }

    async fn count_relationships_by_type(&self) -> Result<Counts, ExecutorError> {
        self.fetch_counts(cypher::RELATIONSHIP_COUNTS, "type").await
    }

    async fn close(&self) -> Result<(), ExecutorError> {
        // The driver pool shuts down when the handle drops.
        info!("✓ Neo4j connection to {} closed", self.uri);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "neo4j"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_rows_convert_to_bolt_maps() {
        let row = json!({"key": "o1", "props": {"price": 9.5, "qty": 2, "gift": false, "note": null}});
        match json_to_bolt(&row) {
            BoltType::Map(map) => {
                assert_eq!(map.value.len(), 2);
                match map.value.get(&neo4rs::BoltString::new("props")) {
                    Some(BoltType::Map(props)) => {
                        assert!(matches!(
                            props.value.get(&neo4rs::BoltString::new("qty")),
                            Some(BoltType::Integer(_))
                        ));
                        assert!(matches!(
                            props.value.get(&neo4rs::BoltString::new("price")),
                            Some(BoltType::Float(_))
                        ));
                        assert!(matches!(
                            props.value.get(&neo4rs::BoltString::new("note")),
                            Some(BoltType::Null(_))
                        ));
                    }
                    other => panic!("props should be a map, got {:?}", other),
                }
            }
            other => panic!("row should be a map, got {:?}", other),
        }
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use falkordb::{FalkorAsyncClient, FalkorClientBuilder, FalkorConnectionInfo, FalkorValue};
use log::{debug, error, info};
use serde_json::Value;

use super::{cypher, BatchStatement, ConstraintOutcome, Counts, ExecutorError, GraphExecutor};
use crate::config::ConnectionConfig;
use crate::schema::EntityDescriptor;

/// FalkorDB backend. The configured database name selects the graph.
pub struct FalkorExecutor {
    client: FalkorAsyncClient,
    graph_name: String,
}

/// `falkor://host:port` with credentials spliced in when given.
pub fn falkor_url(config: &ConnectionConfig) -> String {
    let address = config
        .uri
        .split_once("://")
        .map_or(config.uri.as_str(), |(_, rest)| rest);
    match (&config.username, &config.password) {
        (Some(user), Some(pass)) => format!("falkor://{}:{}@{}", user, pass, address),
        (Some(user), None) => format!("falkor://{}@{}", user, address),
        _ => format!("falkor://{}", address),
    }
}

fn count_row(row: &[FalkorValue]) -> Option<(String, i64)> {
    match row {
        [FalkorValue::String(name), FalkorValue::I64(count)] => Some((name.clone(), *count)),
        [FalkorValue::None, FalkorValue::I64(count)] => Some((String::new(), *count)),
        _ => None,
    }
}

impl FalkorExecutor {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ExecutorError> {
        info!("Connecting to FalkorDB at {}...", config.uri);

        let connection_info: FalkorConnectionInfo = falkor_url(config)
            .try_into()
            .map_err(|e| ExecutorError::Connection(format!("Invalid connection info: {:?}", e)))?;

        let client = FalkorClientBuilder::new_async()
            .with_connection_info(connection_info)
            .build()
            .await
            .map_err(|e| ExecutorError::Connection(format!("Failed to build client: {:?}", e)))?;

        let executor = Self {
            client,
            graph_name: config.database.clone(),
        };
        executor.ping().await?;

        info!("✅ Connected to FalkorDB graph '{}'", executor.graph_name);
        Ok(executor)
    }

    async fn execute_graph_query(&self, query: &str) -> Result<(), ExecutorError> {
        let mut graph = self.client.select_graph(&self.graph_name);
        graph.query(query).execute().await.map_err(|e| {
            let failure = ExecutorError::classify(format!("{:?}", e));
            if let ExecutorError::Connection(_) = failure {
                error!("❌ Connection error detected - FalkorDB may have crashed: {:?}", e);
            }
            failure
        })?;
        Ok(())
    }

    async fn fetch_counts(&self, query: &str) -> Result<Counts, ExecutorError> {
        let mut graph = self.client.select_graph(&self.graph_name);
        let result = graph
            .query(query)
            .execute()
            .await
            .map_err(|e| ExecutorError::classify(format!("{:?}", e)))?;

        let mut counts = Vec::new();
        for row in result.data {
            let parsed = count_row(&row)
                .ok_or_else(|| ExecutorError::Rejected(format!("malformed count row: {:?}", row)))?;
            counts.push(parsed);
        }
        Ok(counts)
    }
}

#[async_trait]
impl GraphExecutor for FalkorExecutor {
    async fn ping(&self) -> Result<(), ExecutorError> {
        self.execute_graph_query(cypher::PING).await
    }

    async fn ensure_unique_constraint(
        &self,
        descriptor: &'static EntityDescriptor,
    ) -> Result<ConstraintOutcome, ExecutorError> {
        let index = cypher::falkor_key_index(descriptor);
        debug!("  Creating supporting index: {}", index);
        match self.execute_graph_query(&index).await {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e),
        }

        let constraint = cypher::falkor_unique_constraint(descriptor);
        debug!("  Creating constraint: {}", constraint);
        match self.execute_graph_query(&constraint).await {
            Ok(()) => Ok(ConstraintOutcome::Created),
            Err(e) if e.is_already_exists() => Ok(ConstraintOutcome::AlreadyExists),
            Err(e) => Err(e),
        }
    }

    async fn write_batch(&self, statement: &BatchStatement) -> Result<(), ExecutorError> {
        let mut graph = self.client.select_graph(&self.graph_name);
        let mut params = HashMap::new();
        params.insert("batch".to_string(), Value::Array(statement.rows.clone()));

        graph
            .query(&statement.cypher)
            .with_json_params(&params)
            .execute()
            .await
            .map_err(|e| ExecutorError::classify(format!("{:?}", e)))?;
        Ok(())
    }

    async fn count_nodes_by_label(&self) -> Result<Counts, ExecutorError> {
        self.fetch_counts(cypher::NODE_COUNTS).await
    }

    async fn count_relationships_by_type(&self) -> Result<Counts, ExecutorError> {
        self.fetch_counts(cypher::RELATIONSHIP_COUNTS).await
    }

    async fn close(&self) -> Result<(), ExecutorError> {
        info!("✓ FalkorDB connection closed");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "falkordb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(uri: &str, username: Option<&str>, password: Option<&str>) -> ConnectionConfig {
        ConnectionConfig {
            uri: uri.to_string(),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            database: "olist".to_string(),
        }
    }

    #[test]
    fn urls_carry_credentials_when_given() {
        assert_eq!(
            falkor_url(&config("falkor://localhost:6379", None, None)),
            "falkor://localhost:6379"
        );
        assert_eq!(
            falkor_url(&config("redis://db:6380", Some("loader"), Some("secret"))),
            "falkor://loader:secret@db:6380"
        );
        assert_eq!(
            falkor_url(&config("db:6380", Some("loader"), None)),
            "falkor://loader@db:6380"
        );
    }

    #[test]
    fn count_rows_parse_label_and_count() {
        let row = vec![FalkorValue::String("Order".into()), FalkorValue::I64(4)];
        assert_eq!(count_row(&row), Some(("Order".to_string(), 4)));
        assert_eq!(count_row(&[FalkorValue::I64(4)]), None);
    }
}

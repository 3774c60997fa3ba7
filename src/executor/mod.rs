//! The transactional boundary to the graph database.
//!
//! The loader only ever issues constraint statements, parameterised batch
//! writes and two aggregate counts, so that is all a backend implements.

use std::sync::OnceLock;

use async_trait::async_trait;
use log::{error, info, warn};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::config::{Backend, ConnectionConfig};
use crate::schema::EntityDescriptor;

pub mod cypher;
pub mod falkor;
pub mod memory;
pub mod neo4j;

pub use falkor::FalkorExecutor;
pub use memory::MemoryExecutor;
pub use neo4j::Neo4jExecutor;

#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    #[error("connection failure: {0}")]
    Connection(String),
    #[error("statement rejected: {0}")]
    Rejected(String),
}

impl ExecutorError {
    /// Sorts a driver error message into connection trouble or a rejected statement.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("connection")
            || lower.contains("broken pipe")
            || lower.contains("reset")
            || lower.contains("refused")
            || lower.contains("os error")
            || lower.contains("timed out")
            || lower.contains("unauthorized")
            || lower.contains("authentication")
        {
            ExecutorError::Connection(message)
        } else {
            ExecutorError::Rejected(message)
        }
    }

    /// Whether the database refused a schema statement only because it is already in place.
    pub fn is_already_exists(&self) -> bool {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"(?i)already exists|equivalent|already indexed|index exists|already created")
                .expect("static pattern")
        });
        match self {
            ExecutorError::Rejected(message) => pattern.is_match(message),
            ExecutorError::Connection(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOutcome {
    Created,
    AlreadyExists,
}

/// One batch write: generated statement text plus its `$batch` rows.
///
/// Each row is `{key, props: {...}, links: {REL_TYPE: parent_key}}`. Backends
/// that speak Cypher send `cypher` with `rows` as the `batch` parameter; the
/// in-memory backend interprets the rows against `descriptor` directly.
#[derive(Debug, Clone)]
pub struct BatchStatement {
    pub descriptor: &'static EntityDescriptor,
    pub cypher: String,
    pub rows: Vec<Value>,
}

/// `(name, count)` pairs from an aggregate query.
pub type Counts = Vec<(String, i64)>;

#[async_trait]
pub trait GraphExecutor: Send + Sync {
    /// Cheap round trip proving the database is reachable and accepts our credentials.
    async fn ping(&self) -> Result<(), ExecutorError>;

    async fn ensure_unique_constraint(
        &self,
        descriptor: &'static EntityDescriptor,
    ) -> Result<ConstraintOutcome, ExecutorError>;

    /// Applies one batch atomically.
    async fn write_batch(&self, statement: &BatchStatement) -> Result<(), ExecutorError>;

    async fn count_nodes_by_label(&self) -> Result<Counts, ExecutorError>;

    async fn count_relationships_by_type(&self) -> Result<Counts, ExecutorError>;

    /// Releases the connection. Called exactly once, on every exit path.
    async fn close(&self) -> Result<(), ExecutorError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str;
}

/// Opens the selected backend; fails fast when the database is unreachable.
pub async fn connect(
    backend: Backend,
    config: &ConnectionConfig,
) -> Result<Box<dyn GraphExecutor>, ExecutorError> {
    Ok(match backend {
        Backend::Neo4j => Box::new(Neo4jExecutor::connect(config).await?),
        Backend::Falkordb => Box::new(FalkorExecutor::connect(config).await?),
        Backend::Memory => Box::new(MemoryExecutor::new()),
    })
}

/// Pings the database and releases the connection; `true` when the ping succeeded.
pub async fn check_connection(executor: &dyn GraphExecutor) -> bool {
    let ok = match executor.ping().await {
        Ok(()) => {
            info!("✓ Connection successful!");
            info!("✓ {} is ready for import!", executor.backend_name());
            true
        }
        Err(e) => {
            error!("✗ Connection failed: {}", e);
            false
        }
    };
    if let Err(e) = executor.close().await {
        warn!("⚠️ Failed to close {} connection: {}", executor.backend_name(), e);
    }
    ok
}

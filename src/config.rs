use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Serialize;

use crate::coerce::CoercionPolicy;
use crate::error::{LoadError, Result};

pub const DEFAULT_DATABASE: &str = "neo4j";
pub const DEFAULT_URI: &str = "neo4j://localhost:7687";
pub const DEFAULT_BATCH_SIZE: usize = 5000;
pub const DEFAULT_DATA_DIR: &str = "Data Preprocessing";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Backend {
    #[default]
    Neo4j,
    Falkordb,
    /// In-process graph; nothing is persisted.
    Memory,
}

/// Where the graph lives and who we are.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub uri: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Database (Neo4j) or graph (FalkorDB) name.
    pub database: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            username: None,
            password: None,
            database: DEFAULT_DATABASE.to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Blank database names fall back to the default.
    pub fn with_database(mut self, database: Option<String>) -> Self {
        self.database = database
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub coercion: CoercionPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            coercion: CoercionPolicy::default(),
        }
    }
}

impl LoadOptions {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(LoadError::InvalidBatch {
                label: "*",
                reason: "batch size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Loads `KEY=value` lines from an env file into the process environment,
/// `.env` in the working directory or a parent when no path is given.
/// Variables that are already set are left alone. Returns the file read.
pub fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenvy::from_path(path).ok().map(|()| path.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}

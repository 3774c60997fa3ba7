//! Olist e-commerce graph loader.
//!
//! Loads customers, products, sellers, orders, order items, reviews and
//! payments from CSV extracts into a property graph (Neo4j or FalkorDB) as
//! batched, idempotent merges, in an order that lets every relationship find
//! both of its endpoints.

pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod progress;
pub mod schema;
pub mod source;
pub mod verify;

pub use config::{Backend, ConnectionConfig, LoadOptions};
pub use engine::{BatchUpserter, EntitySummary};
pub use error::{LoadError, Result};
pub use executor::{GraphExecutor, MemoryExecutor};
pub use orchestrator::{LoadReport, LoadState, Orchestrator};
pub use schema::{EntityKind, LOAD_ORDER};
pub use source::{CsvDirectorySource, MemorySource, Record, RecordSource};
pub use verify::Verification;

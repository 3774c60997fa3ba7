use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use olist_graph_loader::coerce::CoercionPolicy;
use olist_graph_loader::config::{load_env_file, DEFAULT_BATCH_SIZE, DEFAULT_DATA_DIR, DEFAULT_URI};
use olist_graph_loader::executor::{self, check_connection};
use olist_graph_loader::orchestrator::format_elapsed;
use olist_graph_loader::{
    Backend, ConnectionConfig, CsvDirectorySource, LoadError, LoadOptions, LoadReport, Orchestrator,
};

const DEFAULT_FALKOR_URI: &str = "falkor://localhost:6379";

/// Olist knowledge graph loader
///
/// Loads the Olist e-commerce CSV extracts into a property graph: unique
/// constraints first, then customers, products, sellers, orders, order items,
/// reviews and payments in batches, then a count of what landed.
#[derive(Parser)]
#[command(name = "olist-graph-loader")]
#[command(about = "Load the Olist e-commerce dataset into a graph database")]
struct Args {
    /// Graph database backend
    #[arg(long, value_enum, default_value_t = Backend::Neo4j)]
    backend: Backend,

    /// Database URI (defaults to the backend's local address)
    #[arg(long, env = "NEO4J_URI")]
    uri: Option<String>,

    /// Database username
    #[arg(long, env = "NEO4J_USERNAME")]
    username: Option<String>,

    /// Database password
    #[arg(long, env = "NEO4J_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Target database (Neo4j) or graph (FalkorDB) name [default: neo4j]
    #[arg(long, env = "NEO4J_DATABASE")]
    database: Option<String>,

    /// Directory containing the enhanced sample CSV files
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Records per batch write
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// What to do with a value that does not fit its column type
    #[arg(long, value_enum, default_value_t = CoercionPolicy::Lenient)]
    coercion: CoercionPolicy,

    /// Only test connectivity, then exit
    #[arg(long)]
    check_connection: bool,

    /// Write the run report as JSON to this path
    #[arg(long)]
    report_json: Option<PathBuf>,
}

impl Args {
    fn connection(&self) -> ConnectionConfig {
        let uri = self.uri.clone().unwrap_or_else(|| match self.backend {
            Backend::Falkordb => DEFAULT_FALKOR_URI.to_string(),
            Backend::Neo4j | Backend::Memory => DEFAULT_URI.to_string(),
        });
        ConnectionConfig {
            uri,
            username: self.username.clone(),
            password: self.password.clone(),
            ..ConnectionConfig::default()
        }
        .with_database(self.database.clone())
    }
}

fn write_report(path: &Path, report: &LoadReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("writing report to {:?}", path))?;
    info!("Report written to {:?}", path);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // NEO4J_* settings may live in .env; it has to be read before clap looks at the environment.
    let env_file = load_env_file(None);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Some(path) = &env_file {
        info!("Loaded environment from {:?}", path);
    }

    let args = Args::parse();
    let connection = args.connection();

    info!("{}", "=".repeat(60));
    info!("  Olist E-commerce Knowledge Graph Import");
    info!("{}", "=".repeat(60));

    let executor = match executor::connect(args.backend, &connection).await {
        Ok(executor) => executor,
        Err(e) => {
            error!("❌ {}", LoadError::Connectivity(e));
            std::process::exit(1);
        }
    };

    if args.check_connection {
        let ok = check_connection(executor.as_ref()).await;
        std::process::exit(if ok { 0 } else { 1 });
    }

    let options = LoadOptions {
        batch_size: args.batch_size,
        coercion: args.coercion,
    };
    let mut orchestrator =
        Orchestrator::new(executor, CsvDirectorySource::new(&args.data_dir), options);

    match orchestrator.run().await {
        Ok(report) => {
            info!("{}", "=".repeat(60));
            info!("✓ Import completed successfully in {}", format_elapsed(report.elapsed));
            info!("{}", "=".repeat(60));
            if let Some(path) = &args.report_json {
                write_report(path, &report)?;
            }
        }
        Err(e) => {
            let failed_in = orchestrator
                .history()
                .iter()
                .rev()
                .nth(1)
                .copied()
                .unwrap_or(orchestrator.state());
            error!("❌ Loading failed during {}: {}", failed_in, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

mod common;

use std::fs;
use std::path::Path;

use serde_json::json;
use tempfile::TempDir;

use olist_graph_loader::{
    CsvDirectorySource, EntityKind, LoadError, LoadOptions, LoadState, MemoryExecutor,
    Orchestrator, Record, RecordSource, LOAD_ORDER,
};

use common::*;

/// Writes every entity of `source` to its CSV file under `dir`, with the full
/// header each file is expected to carry. Columns a record lacks stay blank.
fn write_csv_files(dir: &Path, source: &impl RecordSource) {
    for kind in LOAD_ORDER {
        let columns = kind.descriptor().required_columns();
        let mut writer = csv::Writer::from_path(dir.join(kind.descriptor().source_file)).unwrap();
        writer.write_record(&columns).unwrap();
        for record in source.records(kind).unwrap() {
            let row: Vec<&str> = columns
                .iter()
                .map(|c| record.get(*c).map_or("", String::as_str))
                .collect();
            writer.write_record(&row).unwrap();
        }
        writer.flush().unwrap();
    }
}

fn with_zip(mut record: Record, column: &str, zip: &str) -> Record {
    record.insert(column.to_string(), zip.to_string());
    record
}

#[tokio::test]
async fn loads_a_directory_of_csv_files() {
    let dir = TempDir::new().unwrap();
    let source = storefront()
        .with(
            EntityKind::Customer,
            vec![with_zip(customer("c4"), "customer_zip_code_prefix", "01046")],
        )
        .with(EntityKind::Review, vec![review("r1", "o1"), review("r2", "o4")])
        .with(
            EntityKind::Payment,
            vec![payment("o1", "1.0"), payment("o1", "2"), payment("o3", "1")],
        );
    write_csv_files(dir.path(), &source);

    let exec = MemoryExecutor::new();
    let mut orchestrator = Orchestrator::new(
        Box::new(exec.clone()),
        CsvDirectorySource::new(dir.path()),
        LoadOptions {
            batch_size: 2,
            ..LoadOptions::default()
        },
    );
    let report = orchestrator.run().await.unwrap();

    let verification = report.verification.as_ref().unwrap();
    assert_eq!(verification.node_count("Customer"), 4);
    assert_eq!(verification.node_count("Review"), 2);
    assert_eq!(verification.node_count("Payment"), 3);
    assert_eq!(verification.relationship_count("HAS_REVIEW"), 2);
    assert_eq!(verification.relationship_count("PAID_WITH"), 3);
    assert_eq!(verification.relationship_count("SOLD_BY"), 6);

    assert!(exec.contains_node("Payment", "o1_1"));
    assert_eq!(
        exec.node_property("Customer", "c4", "zip_code"),
        Some(json!("01046"))
    );
    // Blank cells are never stored.
    assert_eq!(exec.node_property("Customer", "c4", "first_purchase"), None);
    assert_eq!(report.entity(EntityKind::Payment).unwrap().batches, 2);
    assert_eq!(orchestrator.state(), LoadState::Done);
}

#[tokio::test]
async fn a_missing_file_fails_the_run_at_that_entity() {
    let dir = TempDir::new().unwrap();
    write_csv_files(dir.path(), &storefront());
    fs::remove_file(dir.path().join(EntityKind::Order.descriptor().source_file)).unwrap();

    let exec = MemoryExecutor::new();
    let mut orchestrator = Orchestrator::new(
        Box::new(exec.clone()),
        CsvDirectorySource::new(dir.path()),
        LoadOptions::default(),
    );

    match orchestrator.run().await {
        Err(LoadError::SourceRead { label, path, .. }) => {
            assert_eq!(label, "Order");
            assert!(path.ends_with(EntityKind::Order.descriptor().source_file));
        }
        other => panic!("expected SourceRead, got {:?}", other),
    }
    assert_eq!(orchestrator.state(), LoadState::Failed);
    assert_eq!(exec.node_count("Seller"), 2);
    assert_eq!(exec.node_count("Order"), 0);
    assert!(exec.is_closed());
}

#[tokio::test]
async fn a_file_without_its_key_column_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_csv_files(dir.path(), &storefront());
    fs::write(
        dir.path().join(EntityKind::Customer.descriptor().source_file),
        "customer_unique_id,customer_city\nu-1,campinas\n",
    )
    .unwrap();

    let exec = MemoryExecutor::new();
    let err = Orchestrator::new(
        Box::new(exec.clone()),
        CsvDirectorySource::new(dir.path()),
        LoadOptions::default(),
    )
    .run()
    .await
    .unwrap_err();

    assert!(err.to_string().contains("customer_id"), "{}", err);
    assert_eq!(exec.write_calls(), 0);
}

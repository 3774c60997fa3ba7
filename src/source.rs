use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::Reader;
use log::info;

use crate::error::{LoadError, Result};
use crate::schema::EntityKind;

/// One source row: column name to raw cell text.
pub type Record = HashMap<String, String>;

/// Yields the rows of one entity type, in source order.
pub trait RecordSource {
    fn records(&self, kind: EntityKind) -> Result<Vec<Record>>;
}

/// Reads each entity from its fixed CSV file inside a directory.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    data_dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.data_dir.join(kind.descriptor().source_file)
    }

    fn read_csv_file(&self, kind: EntityKind, file_path: &Path) -> Result<Vec<Record>> {
        let descriptor = kind.descriptor();
        let read_error = |reason: String| LoadError::SourceRead {
            label: descriptor.label,
            path: file_path.to_path_buf(),
            reason,
        };

        let file = File::open(file_path).map_err(|e| read_error(e.to_string()))?;
        let mut rdr = Reader::from_reader(file);

        let headers = rdr.headers().map_err(|e| read_error(e.to_string()))?;
        let missing: Vec<&str> = descriptor
            .required_columns()
            .into_iter()
            .filter(|column| !headers.iter().any(|h| h == *column))
            .collect();
        if !missing.is_empty() {
            return Err(read_error(format!(
                "missing column(s): {}",
                missing.join(", ")
            )));
        }

        let mut records = Vec::new();
        for (line, result) in rdr.deserialize::<Record>().enumerate() {
            let record = result.map_err(|e| read_error(format!("row {}: {}", line + 1, e)))?;
            records.push(record);
        }

        info!("  Read {} rows from {:?}", records.len(), file_path);
        Ok(records)
    }
}

impl RecordSource for CsvDirectorySource {
    fn records(&self, kind: EntityKind) -> Result<Vec<Record>> {
        let path = self.path_for(kind);
        self.read_csv_file(kind, &path)
    }
}

/// Records held in memory, keyed by entity. Entities never given are empty.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: HashMap<EntityKind, Vec<Record>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: EntityKind, records: Vec<Record>) -> Self {
        self.records.entry(kind).or_default().extend(records);
        self
    }

    pub fn push(&mut self, kind: EntityKind, record: Record) {
        self.records.entry(kind).or_default().push(record);
    }
}

impl RecordSource for MemorySource {
    fn records(&self, kind: EntityKind) -> Result<Vec<Record>> {
        Ok(self.records.get(&kind).cloned().unwrap_or_default())
    }
}

/// Builds a record from `(column, value)` pairs.
pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Record {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

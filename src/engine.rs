//! Batch upsert engine: records in, idempotent merge statements out.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::coerce::{coerce, normalize_sequence, Coerced, CoercionPolicy};
use crate::config::LoadOptions;
use crate::error::{LoadError, Result};
use crate::executor::{cypher, BatchStatement, GraphExecutor};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::schema::{EntityDescriptor, EntityKind, KeySpec, COMPOSITE_KEY_SEPARATOR};
use crate::source::Record;

/// Invalid cells logged individually per batch before going quiet.
const INVALID_VALUE_LOG_LIMIT: usize = 3;

/// Business key of a record, or `None` if any key column is blank.
pub fn derive_key(descriptor: &EntityDescriptor, record: &Record) -> Option<String> {
    let field = |column: &str| {
        record
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };
    match descriptor.key {
        KeySpec::Natural(column) => field(column).map(str::to_string),
        KeySpec::Composite { parent, sequence } => {
            let parent = field(parent)?;
            let sequence = field(sequence)?;
            Some(format!(
                "{}{}{}",
                parent,
                COMPOSITE_KEY_SEPARATOR,
                normalize_sequence(sequence)
            ))
        }
    }
}

/// A batch converted to statement rows.
#[derive(Debug)]
pub struct PreparedBatch {
    pub statement: BatchStatement,
    pub keys: Vec<String>,
    /// Records dropped for a blank key.
    pub skipped: usize,
    /// Cells written as null because they did not coerce.
    pub invalid_values: usize,
}

/// Totals for one entity type's load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub label: &'static str,
    pub records: usize,
    pub batches: usize,
    pub skipped: usize,
    pub invalid_values: usize,
    pub distinct_keys: usize,
}

/// Turns record batches into merge-by-key writes against one executor.
pub struct BatchUpserter<'a> {
    executor: &'a dyn GraphExecutor,
    options: LoadOptions,
    progress: &'a dyn ProgressSink,
}

impl<'a> BatchUpserter<'a> {
    pub fn new(
        executor: &'a dyn GraphExecutor,
        options: LoadOptions,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            executor,
            options,
            progress,
        }
    }

    /// Derives keys and coerces attributes. `offset` is the index of the
    /// batch's first record within the whole entity load.
    pub fn prepare(&self, kind: EntityKind, batch: &[Record], offset: usize) -> Result<PreparedBatch> {
        let descriptor = kind.descriptor();
        let mut rows = Vec::with_capacity(batch.len());
        let mut keys = Vec::with_capacity(batch.len());
        let mut skipped = 0;
        let mut invalid_values = 0;

        for (i, record) in batch.iter().enumerate() {
            let index = offset + i;
            let Some(key) = derive_key(descriptor, record) else {
                warn!(
                    "⚠️ Skipping {} record {}: blank key column(s) {:?}",
                    descriptor.label,
                    index + 1,
                    descriptor.key.columns()
                );
                skipped += 1;
                continue;
            };

            let mut props = Map::new();
            for attribute in descriptor.attributes {
                let raw = record.get(attribute.column).map_or("", String::as_str);
                let value = match coerce(raw, attribute.ty) {
                    Coerced::Value(value) => value,
                    Coerced::Null => Value::Null,
                    Coerced::Invalid => {
                        if self.options.coercion == CoercionPolicy::Strict {
                            return Err(LoadError::Coercion {
                                label: descriptor.label,
                                record: index + 1,
                                column: attribute.column,
                                value: raw.to_string(),
                                expected: attribute.ty.name(),
                            });
                        }
                        if invalid_values < INVALID_VALUE_LOG_LIMIT {
                            warn!(
                                "⚠️ {} {}: '{}' in column {} is not a valid {}, storing null",
                                descriptor.label,
                                key,
                                raw,
                                attribute.column,
                                attribute.ty.name()
                            );
                        }
                        invalid_values += 1;
                        Value::Null
                    }
                };
                props.insert(attribute.property.to_string(), value);
            }

            let mut links = Map::new();
            for link in descriptor.parents {
                let parent_key = record
                    .get(link.column)
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map_or(Value::Null, |v| Value::String(v.to_string()));
                links.insert(link.rel_type.to_string(), parent_key);
            }

            rows.push(json!({
                "key": key.clone(),
                "props": props,
                "links": links,
            }));
            keys.push(key);
        }

        Ok(PreparedBatch {
            statement: BatchStatement {
                descriptor,
                cypher: cypher::upsert(descriptor),
                rows,
            },
            keys,
            skipped,
            invalid_values,
        })
    }

    /// Upserts one batch: merges every node by key, overwrites its attributes
    /// and links it to whichever declared parents already exist.
    pub async fn upsert_entity(&self, kind: EntityKind, batch: &[Record]) -> Result<PreparedBatch> {
        self.upsert_batch(kind, batch, 0, 0).await
    }

    async fn upsert_batch(
        &self,
        kind: EntityKind,
        batch: &[Record],
        batch_index: usize,
        offset: usize,
    ) -> Result<PreparedBatch> {
        let label = kind.label();
        if batch.is_empty() {
            return Err(LoadError::InvalidBatch {
                label,
                reason: "batch is empty".to_string(),
            });
        }
        if batch.len() > self.options.batch_size {
            return Err(LoadError::InvalidBatch {
                label,
                reason: format!(
                    "{} records exceeds the batch size of {}",
                    batch.len(),
                    self.options.batch_size
                ),
            });
        }

        let prepared = self.prepare(kind, batch, offset)?;
        if prepared.statement.rows.is_empty() {
            warn!("⚠️ {} batch {} has no loadable records", label, batch_index + 1);
            return Ok(prepared);
        }

        if batch_index == 0 {
            debug!("    Generated UNWIND query: {}", prepared.statement.cypher);
        }

        self.executor
            .write_batch(&prepared.statement)
            .await
            .map_err(|source| LoadError::WriteExecution {
                label,
                batch: batch_index + 1,
                source,
            })?;
        Ok(prepared)
    }

    /// Loads every record of one entity type, one batch at a time, in order.
    pub async fn load_entity(&self, kind: EntityKind, records: &[Record]) -> Result<EntitySummary> {
        self.options.validate()?;
        let start_time = Instant::now();
        let label = kind.label();
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        info!("[{}] Loading {} {} records...", timestamp, records.len(), label);

        let mut summary = EntitySummary {
            label,
            records: records.len(),
            ..EntitySummary::default()
        };
        if records.is_empty() {
            info!("  No {} records to load", label);
            return Ok(summary);
        }

        let batch_size = self.options.batch_size;
        let batches = records.len().div_ceil(batch_size);
        let mut distinct = HashSet::new();
        let mut processed = 0;

        for (batch_index, batch) in records.chunks(batch_size).enumerate() {
            let batch_start_time = Instant::now();
            let prepared = self
                .upsert_batch(kind, batch, batch_index, processed)
                .await?;

            processed += batch.len();
            summary.batches += 1;
            summary.skipped += prepared.skipped;
            summary.invalid_values += prepared.invalid_values;
            distinct.extend(prepared.keys);

            self.progress.on_progress(&ProgressEvent {
                label,
                batch: batch_index + 1,
                batches,
                processed,
                total: records.len(),
            });
            debug!(
                "  Batch {}/{} complete: {} records (Duration: {:?})",
                batch_index + 1,
                batches,
                batch.len(),
                batch_start_time.elapsed()
            );
        }
        summary.distinct_keys = distinct.len();

        if summary.invalid_values > 0 {
            warn!(
                "⚠️ {} {} value(s) could not be coerced and were stored as null",
                summary.invalid_values, label
            );
        }
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        info!(
            "[{}] ✅ Loaded {} {} records in {} batch(es) (Duration: {:?})",
            timestamp,
            processed - summary.skipped,
            label,
            summary.batches,
            start_time.elapsed()
        );
        Ok(summary)
    }
}

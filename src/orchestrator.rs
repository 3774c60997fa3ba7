//! Drives a whole load: constraints, entities in dependency order, verification.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;

use crate::config::LoadOptions;
use crate::engine::{BatchUpserter, EntitySummary};
use crate::error::{LoadError, Result};
use crate::executor::{ConstraintOutcome, GraphExecutor};
use crate::progress::{LogProgress, ProgressSink};
use crate::schema::{EntityKind, LOAD_ORDER};
use crate::source::RecordSource;
use crate::verify::{verify, Verification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadState {
    NotStarted,
    ConstraintsReady,
    /// Index into [`LOAD_ORDER`].
    Loading(usize),
    Verifying,
    Done,
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Loading(i) => match LOAD_ORDER.get(*i) {
                Some(kind) => write!(f, "Loading({})", kind),
                None => write!(f, "Loading(#{})", i),
            },
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub backend: &'static str,
    pub entities: Vec<EntitySummary>,
    /// `None` when the verification queries failed.
    pub verification: Option<Verification>,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn entity(&self, kind: EntityKind) -> Option<&EntitySummary> {
        self.entities.iter().find(|e| e.label == kind.label())
    }
}

/// `"{minutes}m {seconds}s"`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Owns the executor for the length of a run and releases it on every exit path.
pub struct Orchestrator<S> {
    executor: Box<dyn GraphExecutor>,
    source: S,
    options: LoadOptions,
    progress: Box<dyn ProgressSink>,
    state: LoadState,
    history: Vec<LoadState>,
}

impl<S: RecordSource> Orchestrator<S> {
    pub fn new(executor: Box<dyn GraphExecutor>, source: S, options: LoadOptions) -> Self {
        Self {
            executor,
            source,
            options,
            progress: Box::new(LogProgress),
            state: LoadState::NotStarted,
            history: vec![LoadState::NotStarted],
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Every state entered so far, starting with `NotStarted`.
    pub fn history(&self) -> &[LoadState] {
        &self.history
    }

    fn transition(&mut self, next: LoadState) {
        info!("Pipeline state: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Runs the pipeline once. The executor is closed before this returns,
    /// whether the run succeeded or not.
    pub async fn run(&mut self) -> Result<LoadReport> {
        if self.state != LoadState::NotStarted {
            return Err(LoadError::AlreadyRun);
        }

        let outcome = self.drive().await;
        if let Err(e) = &outcome {
            error!("❌ Error during import: {}", e);
            self.transition(LoadState::Failed);
        }

        if let Err(e) = self.executor.close().await {
            warn!("⚠️ Failed to close {} connection: {}", self.executor.backend_name(), e);
        }
        outcome
    }

    async fn drive(&mut self) -> Result<LoadReport> {
        let start_time = Instant::now();
        self.options.validate()?;

        self.ensure_constraints().await?;
        self.transition(LoadState::ConstraintsReady);

        let mut entities = Vec::with_capacity(LOAD_ORDER.len());
        for (index, kind) in LOAD_ORDER.into_iter().enumerate() {
            self.transition(LoadState::Loading(index));
            let records = self.source.records(kind)?;
            let upserter =
                BatchUpserter::new(self.executor.as_ref(), self.options, self.progress.as_ref());
            entities.push(upserter.load_entity(kind, &records).await?);
        }

        self.transition(LoadState::Verifying);
        let verification = match verify(self.executor.as_ref()).await {
            Ok(verification) => {
                verification.log();
                for shortfall in verification.shortfalls(&entities) {
                    warn!(
                        "⚠️ {} has {} node(s), expected at least {}",
                        shortfall.label, shortfall.found, shortfall.expected
                    );
                }
                Some(verification)
            }
            Err(e) => {
                warn!("⚠️ {} (the load itself is committed)", e);
                None
            }
        };

        self.transition(LoadState::Done);
        let elapsed = start_time.elapsed();
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        info!(
            "[{}] ✓ Import completed successfully in {}",
            timestamp,
            format_elapsed(elapsed)
        );

        Ok(LoadReport {
            backend: self.executor.backend_name(),
            entities,
            verification,
            elapsed,
        })
    }

    /// One uniqueness constraint per label; existing constraints are fine,
    /// anything else stops the run before data is written.
    async fn ensure_constraints(&self) -> Result<()> {
        info!("🔒 Creating constraints...");
        let mut created = 0;
        for kind in LOAD_ORDER {
            let descriptor = kind.descriptor();
            match self.executor.ensure_unique_constraint(descriptor).await {
                Ok(ConstraintOutcome::Created) => {
                    created += 1;
                    info!("  ✅ Constraint {} on {}(id)", descriptor.constraint_name(), descriptor.label);
                }
                Ok(ConstraintOutcome::AlreadyExists) => {
                    info!("  Constraint on {}(id) already exists", descriptor.label);
                }
                Err(source) => {
                    return Err(LoadError::Constraint {
                        label: descriptor.label,
                        source,
                    })
                }
            }
        }
        info!("✅ Constraints ready ({} created)", created);
        Ok(())
    }
}

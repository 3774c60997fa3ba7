use log::info;
use serde::Serialize;

/// Emitted once per committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub label: &'static str,
    /// 1-based index of the batch just committed.
    pub batch: usize,
    pub batches: usize,
    pub processed: usize,
    pub total: usize,
}

impl ProgressEvent {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.processed as f64 / self.total as f64) * 100.0
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Logs each event at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        info!(
            "📊 Progress: {:.1}% ({}/{}) {} records loaded",
            event.percent(),
            event.processed,
            event.total,
            event.label
        );
    }
}

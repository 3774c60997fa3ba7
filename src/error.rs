use std::path::PathBuf;

use thiserror::Error;

use crate::executor::ExecutorError;

pub type Result<T> = std::result::Result<T, LoadError>;

/// Everything that can stop (or be reported by) a load run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot reach graph database: {0}")]
    Connectivity(#[source] ExecutorError),

    #[error("failed to create unique constraint on {label}.id: {source}")]
    Constraint {
        label: &'static str,
        #[source]
        source: ExecutorError,
    },

    #[error("cannot read {label} records from {path:?}: {reason}")]
    SourceRead {
        label: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("{label} record {record}: column '{column}' value '{value}' is not a valid {expected}")]
    Coercion {
        label: &'static str,
        record: usize,
        column: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{label} batch {batch} rejected: {source}")]
    WriteExecution {
        label: &'static str,
        batch: usize,
        #[source]
        source: ExecutorError,
    },

    #[error("verification query failed: {0}")]
    Verification(#[source] ExecutorError),

    #[error("invalid {label} batch: {reason}")]
    InvalidBatch { label: &'static str, reason: String },

    #[error("load pipeline has already run")]
    AlreadyRun,
}

impl LoadError {
    /// Whether this error ends the run. Only verification failures are advisory.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LoadError::Verification(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_errors_are_not_fatal() {
        let err = LoadError::Verification(ExecutorError::Rejected("timeout".into()));
        assert!(!err.is_fatal());

        let err = LoadError::WriteExecution {
            label: "Order",
            batch: 2,
            source: ExecutorError::Rejected("type mismatch".into()),
        };
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Order batch 2 rejected: statement rejected: type mismatch"
        );
    }
}

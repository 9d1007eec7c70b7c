//! Engine error types.
//!
//! Five kinds of failure flow out of the engine. Per-file and
//! per-language failures are aggregated rather than fatal: a batch
//! keeps going, collects what failed, and reports one `Batch` error
//! carrying the counts and a representative cause. Queries distinguish
//! "not found" (an empty but well-formed answer) from malformed input
//! (an error before any work happens).

use thiserror::Error;

use crate::store::StoreError;

/// Stable machine-readable tag for an error, used by the JSON
/// envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Storage,
    Script,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// A row that a write-side operation requires is absent. Queries
    /// report absence as an empty result instead.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed caller input; surfaced before any mutation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Underlying store failure, wrapped.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// An extraction or resolution analyzer failed for one unit.
    #[error("analysis of {unit} failed: {message}")]
    Script { unit: String, message: String },

    /// The ambient cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Aggregate over a batch that kept going after unit failures.
    #[error("{failed} of {total} {noun} failed; first error: {first}")]
    Batch {
        failed: usize,
        total: usize,
        /// What the units were ("files" or "languages").
        noun: &'static str,
        first: String,
    },

    #[error("{0}")]
    Io(String),
}

impl EngineError {
    pub fn script(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Script {
            unit: unit.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::Storage(_) | EngineError::Io(_) => ErrorKind::Storage,
            EngineError::Script { .. } | EngineError::Batch { .. } => ErrorKind::Script,
            EngineError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Collects per-unit failures during a batch and turns them into one
/// aggregate error at the end.
#[derive(Debug, Default)]
pub struct BatchErrors {
    errors: Vec<(String, EngineError)>,
}

impl BatchErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, unit: impl Into<String>, error: EngineError) {
        self.errors.push((unit.into(), error));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn failures(&self) -> &[(String, EngineError)] {
        &self.errors
    }

    /// `Ok(())` when nothing failed, otherwise the aggregate error.
    /// Cancellation takes precedence: if any unit was cancelled, the
    /// whole batch reports `Cancelled`.
    pub fn into_result(self, total: usize, noun: &'static str) -> EngineResult<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        if self
            .errors
            .iter()
            .any(|(_, error)| matches!(error, EngineError::Cancelled))
        {
            return Err(EngineError::Cancelled);
        }
        let (unit, first) = &self.errors[0];
        Err(EngineError::Batch {
            failed: self.errors.len(),
            total,
            noun,
            first: format!("{unit}: {first}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_is_ok() {
        assert!(BatchErrors::new().into_result(10, "files").is_ok());
    }

    #[test]
    fn batch_reports_counts_and_first_cause() {
        let mut batch = BatchErrors::new();
        batch.record("a.go", EngineError::script("a.go", "parse failed"));
        batch.record("b.go", EngineError::script("b.go", "parse failed"));

        match batch.into_result(5, "files") {
            Err(EngineError::Batch {
                failed,
                total,
                noun,
                first,
            }) => {
                assert_eq!(failed, 2);
                assert_eq!(total, 5);
                assert_eq!(noun, "files");
                assert!(first.contains("a.go"));
            }
            other => panic!("expected batch error, got {other:?}"),
        }
    }

    #[test]
    fn cancellation_dominates_batch_aggregation() {
        let mut batch = BatchErrors::new();
        batch.record("a.go", EngineError::script("a.go", "parse failed"));
        batch.record("b.go", EngineError::Cancelled);
        assert!(matches!(
            batch.into_result(5, "files"),
            Err(EngineError::Cancelled)
        ));
    }
}

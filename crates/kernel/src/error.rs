//! Engine error types.
//!
//! The engine distinguishes faults (which abort a request) from expected,
//! data-driven outcomes. `ValidationFailed` and `CancelledByEvent` exist as
//! error variants for call sites that cannot produce a partial result; the
//! workflow service itself converts them into `ActionResult` outcomes
//! wherever the transition rules allow a best-effort save.

use thiserror::Error;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown document, parent, or language id. Terminal, never retried.
    #[error("not found")]
    NotFound,

    /// Permission check failed for the acting user. Terminal.
    #[error("forbidden")]
    Forbidden,

    /// Structural or culture-level invalid input. The caller may correct
    /// and resubmit; the engine never retries on its own.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// An event hook vetoed the operation. Nothing was persisted.
    #[error("cancelled by event handler")]
    CancelledByEvent,

    /// The store detected a stale version stamp. The caller should reload
    /// and retry.
    #[error("concurrent modification detected")]
    ConcurrencyConflict,

    /// A hierarchy invariant would be broken. Terminal.
    #[error("structural violation: {0}")]
    StructuralViolation(String),

    /// A collaborator (store, catalog) failed.
    #[error("store error")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether this error aborts the request outright, as opposed to the
    /// expected outcomes the workflow service folds into its result.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::Forbidden | Self::StructuralViolation(_) | Self::Store(_)
        )
    }
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

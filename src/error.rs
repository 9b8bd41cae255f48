//! # Error types
//!
//! The error kinds named in the core's error handling design: one enum per
//! fallible subsystem, wired through [`thiserror::Error`] rather than the
//! hand-rolled `Display` impls a plain `enum` would need. See
//! [`crate::histogram`], [`crate::observable`] and [`crate::simulation`] for
//! where each variant is raised.

use thiserror::Error;

/// Errors raised while building or mutating a [`crate::histogram::Histogram`].
#[derive(Debug, Error)]
pub enum HistogramError {
    /// A binned histogram was asked for with a non-positive bin width.
    #[error("binning width must be positive, got {0}")]
    InvalidWidth(f64),

    /// A CSV line could not be parsed as `key\tvalue`.
    #[error("malformed csv record at line {line}: {text:?}")]
    CsvParse {
        /// 1-indexed line number within the stream.
        line: usize,
        /// The offending line, verbatim.
        text: String,
    },

    /// Underlying I/O failure while reading or writing a CSV stream.
    #[error("histogram I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by arithmetic on [`crate::observable::Observable`] values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObservableError {
    /// Two variable-arity observables (e.g. [`crate::observable::ObservableVec`])
    /// were combined but had different lengths.
    #[error("dimension mismatch: left has {left} components, right has {right}")]
    DimensionMismatch {
        /// Length of the left-hand operand.
        left: usize,
        /// Length of the right-hand operand.
        right: usize,
    },

    /// Two [`crate::observable::HistogramObservable`] values were combined but
    /// their key sets did not match exactly (§4.C/D standardises on exact
    /// match, erroring otherwise).
    #[error("histogram observable keys do not match")]
    KeyMismatch,
}

/// Errors raised while saving or loading engine checkpoints.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The dump file could not be created, moved aside, or read back.
    #[error("checkpoint I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The archive could not be (de)serialized.
    #[error("checkpoint serialization failure: {0}")]
    Serde(#[from] serde_json::Error),

    /// The archive parsed as JSON but its shape did not match the expected
    /// engine state (a stale or foreign file was loaded).
    #[error("corrupt checkpoint archive: {0}")]
    LoadFormat(String),
}

/// Top-level error for engine construction and run entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A parameter failed validation at construction or run-entry (e.g.
    /// `flatness` outside `(0, 1]`, `measurement_number == 0`).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Propagated from histogram operations the engine performs internally.
    #[error(transparent)]
    Histogram(#[from] HistogramError),

    /// Propagated from observable arithmetic the engine performs internally.
    #[error(transparent)]
    Observable(#[from] ObservableError),

    /// Propagated from checkpoint save/load.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

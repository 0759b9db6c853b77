//! Error types for estimators, transformers and archives

use std::io;
use thiserror::Error;

/// Result type for featurizer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for featurizer operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error while persisting or loading an archive
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid argument, usually a violated construction invariant
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid operation for the current state of the object
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Column index beyond the columns tracked by the annotation map
    #[error("Column index {column} is out of range ({num_columns} columns)")]
    ColumnOutOfRange {
        /// Requested column
        column: usize,
        /// Number of columns in the annotation map
        num_columns: usize,
    },

    /// A required annotation has not been published
    #[error("Annotation '{name}' was not found for column {column}")]
    MissingAnnotation {
        /// Column the annotation was looked up on
        column: usize,
        /// Name of the producing estimator
        name: String,
    },

    /// An annotation was published twice for the same key
    #[error("Annotation '{name}' has already been published for column {column}")]
    DuplicateAnnotation {
        /// Column of the existing annotation
        column: usize,
        /// Name of the producing estimator
        name: String,
    },

    /// An annotation exists but holds a different data type
    #[error("Annotation '{name}' for column {column} has an unexpected type")]
    AnnotationType {
        /// Column of the annotation
        column: usize,
        /// Name of the producing estimator
        name: String,
    },

    /// Training data cannot produce a usable result
    #[error("Training error: {0}")]
    Training(String),

    /// Rows presented at inference do not line up with the trained rows
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// Archive header carries a version this build cannot read
    #[error("Unsupported archive version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version found in the archive
        major: u16,
        /// Minor version found in the archive
        minor: u16,
    },

    /// Malformed or truncated archive payload
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A null value was unwrapped
    #[error("Attempted to access the value of a null")]
    NullValue,

    /// Training loop did not converge within the configured number of passes
    #[error("Estimator '{estimator}' requested more than {passes} passes over the data")]
    PassLimitExceeded {
        /// Name of the estimator
        estimator: String,
        /// Configured pass limit
        passes: usize,
    },
}

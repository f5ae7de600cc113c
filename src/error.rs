//! Error types for trueno-features
//!
//! Every failure surfaces as a typed variant. Nothing here is retried
//! automatically; an error aborts the current experiment step only.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// trueno-features error types
#[derive(Error, Debug)]
pub enum Error {
    /// Backing data source (table) cannot be reached
    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    /// Referenced field does not exist in the schema (or has an unusable type)
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Input value outside the domain of a transform
    #[error("Value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Offending value
        value: i64,
        /// Inclusive lower bound
        min: i64,
        /// Inclusive upper bound
        max: i64,
    },

    /// Feature not known at prediction time used in a prediction-safe set
    #[error("Causality violation: feature '{feature}' is training-only and cannot be used for prediction\nRemove it or keep the transform set out of production use")]
    CausalityViolation {
        /// Feature name
        feature: String,
    },

    /// Trainer refused the submission
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// Model has not finished training
    #[error("Model not ready: {0}")]
    ModelNotReady(String),

    /// Training job reported failure
    #[error("Model training failed: {0}")]
    ModelTrainingFailed(String),

    /// Tracker log is empty
    #[error("No experiments recorded")]
    NoExperiments,

    /// Handle replaced by a later submission under the same model name
    #[error("Model '{model_name}' generation {generation} superseded by generation {latest}")]
    ModelSuperseded {
        /// Model name
        model_name: String,
        /// Generation of the stale handle
        generation: u64,
        /// Latest generation under that name
        latest: u64,
    },

    /// Trainer holds no model under this name
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Requested metric missing from the trainer's evaluation output
    #[error("Metric '{0}' not reported by trainer")]
    MissingMetric(String),

    /// Bucket boundaries are not sorted finite cut points
    #[error("Invalid bucket boundaries: {0}")]
    InvalidBoundaries(String),

    /// Transform name not present in the registry
    #[error("Unknown transform: {0}")]
    UnknownTransform(String),

    /// Illegal experiment state transition
    #[error("Invalid experiment transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// Transform set identity already ran to a terminal state
    #[error("Experiment already ran for transform set {0}\nDefine a new transform set to re-run")]
    DuplicateExperiment(String),

    /// Query parsing error
    #[error("SQL parse error: {0}")]
    ParseError(String),

    /// Storage error (Parquet/Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow/Parquet error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

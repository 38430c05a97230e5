//! Error types for the foldwise-core crate.

use crate::space::Configuration;
use thiserror::Error;

/// Top-level error type for engine operations.
///
/// Partition and space errors are raised before any training happens. Per-pair
/// training failures during resampling are *not* errors: they are collected
/// into [`crate::tuning::PairFailure`] entries so the rest of the run survives.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid fraction {fraction}: must lie strictly between 0 and 1")]
    InvalidFraction { fraction: f64 },

    #[error("Invalid fold count {folds}: at least 2 folds are required")]
    InvalidFoldCount { folds: usize },

    #[error("Insufficient rows: {reason}")]
    InsufficientRows { reason: String },

    #[error("Unknown column: {column}")]
    UnknownColumn { column: String },

    #[error("Column '{column}' is not categorical (row {row} holds {value})")]
    NonCategorical {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Invalid configuration space: {0}")]
    InvalidSpace(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Training failed for configuration {configuration}: {source}")]
    TrainingFailure {
        configuration: Configuration,
        #[source]
        source: EstimatorError,
    },

    #[error("No configuration produced a result on any resample")]
    NoSuccessfulConfigurations,

    #[error("Metric '{metric}' has no summaries")]
    UnknownMetric { metric: String },

    #[error("Leakage violation: {overlap} test row(s) also appear in {location}")]
    LeakageViolation { overlap: usize, location: String },

    #[error("Worker pool error: {0}")]
    Pool(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    pub fn insufficient_rows(reason: impl Into<String>) -> Self {
        Self::InsufficientRows {
            reason: reason.into(),
        }
    }

    pub fn unknown_column(column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            column: column.into(),
        }
    }

    pub fn invalid_space(msg: impl Into<String>) -> Self {
        Self::InvalidSpace(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }
}

impl From<figment::Error> for EngineError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Failure reported by an [`crate::estimator::Estimator`] or
/// [`crate::estimator::Transform`] implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EstimatorError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl EstimatorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it reachable through `source()`.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineError>;

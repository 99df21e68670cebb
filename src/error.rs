//! Error types for the analytics pipeline and its collaborators.

use thiserror::Error;

/// Result type for analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A required column is absent from a source table
    #[error("missing required field `{field}` in {entity} table")]
    MissingField { entity: &'static str, field: &'static str },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The risk model could not be fitted
    #[error("model training failed: {0}")]
    ModelTraining(String),

    /// Prediction was requested before any model was trained or injected
    #[error("risk model has not been trained")]
    ModelNotTrained,

    /// The generative-text service failed or could not be reached
    #[error("enhancement service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

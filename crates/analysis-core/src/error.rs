use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// A line item the analysis needs is absent from the latest period.
    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Malformed criteria or metrics table. Fails the whole call.
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl AnalysisError {
    /// Only transient provider failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::ProviderError(_))
    }
}

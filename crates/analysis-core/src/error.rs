use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("API error: {0}")]
    ApiError(String),

    /// The upstream answered but refused the request (4xx other than 429).
    #[error("Request rejected: {0}")]
    RequestRejected(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    /// Transient failures worth another attempt at the collaborator boundary.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::ApiError(_) | AnalysisError::Timeout(_))
    }
}

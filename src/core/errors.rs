use thiserror::Error;

/// Failure taxonomy for the retrieval subsystem.
///
/// Provider and storage failures are recoverable: the engine logs them and
/// degrades to "no context available". [`RagError::DimensionMismatch`] is
/// the one data-integrity case that must propagate, since masking it would
/// silently corrupt ranking quality.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("embedding credential not configured")]
    CredentialMissing,
    #[error("embedding provider error (status {status}): {message}")]
    Provider { status: u16, message: String },
    #[error("embedding request failed: {0}")]
    Network(String),
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl RagError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        RagError::Storage(err.to_string())
    }

    pub fn network<E: std::fmt::Display>(err: E) -> Self {
        RagError::Network(err.to_string())
    }

    /// Whether the engine may swallow this failure and degrade to an empty
    /// result instead of surfacing it to the caller.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RagError::DimensionMismatch { .. })
    }
}

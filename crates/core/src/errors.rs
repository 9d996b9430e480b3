use thiserror::Error;

/// Errors reported by the extraction agent for a single lookup.
///
/// Transient variants re-enter the retry policy; permanent variants take
/// the job straight to terminal error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("target not found: {0}")]
    NotFound(String),

    #[error("agent rejected the command: {0}")]
    Rejected(String),

    #[error("extraction timed out after {0}s")]
    Timeout(u64),

    #[error("agent unavailable: {0}")]
    AgentUnavailable(String),

    #[error("malformed agent response: {0}")]
    MalformedResponse(String),
}

impl ExtractionError {
    /// Whether the retry policy may dispatch the job again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExtractionError::Timeout(_)
                | ExtractionError::AgentUnavailable(_)
                | ExtractionError::MalformedResponse(_)
        )
    }
}

/// Unified error type for the cascade pipeline.
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("missing chain dependency: {0}")]
    DependencyMissing(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Unified Result type.
pub type CascadeResult<T> = std::result::Result<T, CascadeError>;

impl CascadeError {
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn dependency_missing<S: Into<String>>(msg: S) -> Self {
        Self::DependencyMissing(msg.into())
    }

    pub fn persistence_error<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CascadeError::Extraction(e) => e.is_retryable(),
            CascadeError::Database(_) | CascadeError::Persistence(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CascadeError {
    fn from(err: serde_json::Error) -> Self {
        CascadeError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CascadeError {
    fn from(err: config::ConfigError) -> Self {
        CascadeError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_extraction_errors_are_retryable() {
        assert!(ExtractionError::Timeout(25).is_retryable());
        assert!(ExtractionError::AgentUnavailable("connect refused".to_string()).is_retryable());
        assert!(ExtractionError::MalformedResponse("truncated body".to_string()).is_retryable());
    }

    #[test]
    fn test_permanent_extraction_errors_are_not_retryable() {
        assert!(!ExtractionError::NotFound("plate ABC1234".to_string()).is_retryable());
        assert!(!ExtractionError::Rejected("unknown command".to_string()).is_retryable());
    }

    #[test]
    fn test_cascade_error_wraps_extraction_classification() {
        let transient = CascadeError::from(ExtractionError::Timeout(25));
        assert!(transient.is_retryable());

        let permanent = CascadeError::from(ExtractionError::NotFound("x".to_string()));
        assert!(!permanent.is_retryable());

        assert!(!CascadeError::validation_error("bad request").is_retryable());
    }

    #[test]
    fn test_error_display_messages() {
        let err = CascadeError::validation_error("model must not be empty");
        assert_eq!(err.to_string(), "validation failed: model must not be empty");

        let err = ExtractionError::Timeout(25);
        assert_eq!(err.to_string(), "extraction timed out after 25s");
    }
}

//! Service-level error types.
//!
//! The processing stage itself has exactly one failure mode,
//! [`ProcessError::Cancelled`]; everything else here wraps the surrounding
//! transport and configuration machinery.

use crate::processor::ProcessError;
use thiserror::Error;

/// Main error type for quote service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The processing stage was interrupted; the request produced no quote.
    #[error("quote processing failed: {0}")]
    Process(#[from] ProcessError),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ServiceError {
    /// Wrap a transport-layer failure
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for quote service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_converts_and_displays() {
        let error: ServiceError = ProcessError::Cancelled.into();
        assert!(matches!(error, ServiceError::Process(_)));
        assert_eq!(
            error.to_string(),
            "quote processing failed: processing was cancelled before completion"
        );
    }

    #[test]
    fn test_internal_error_constructor() {
        let error = ServiceError::internal("unexpected state");
        assert!(matches!(error, ServiceError::Internal { .. }));
        assert_eq!(error.to_string(), "internal error: unexpected state");
    }

    #[test]
    fn test_transport_error_preserves_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "broker gone");
        let error = ServiceError::transport(io_err);

        assert!(matches!(error, ServiceError::Transport(_)));
        assert!(std::error::Error::source(&error).is_some());
        assert!(error.to_string().contains("broker gone"));
    }

    #[test]
    fn test_config_error_converts() {
        let config_err = crate::config::ConfigError::InvalidConfig("bad".to_string());
        let error: ServiceError = config_err.into();
        assert!(matches!(error, ServiceError::Config(_)));
    }
}

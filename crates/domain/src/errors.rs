//! Error types used throughout the client

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification used by callers deciding whether to retry later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Token endpoint rejected the grant or returned an incomplete payload
    Authentication,
    /// Network or rate-limit failure that survived every transport retry
    Transient,
    /// An API call failed after the transport gave up
    Request,
    /// Client construction or caller-supplied input problem
    Config,
    /// Broken internal invariant
    Internal,
}

/// Main error type for the Helki client
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HelkiError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Transient transport error: {0}")]
    TransientTransport(String),

    #[error("API request to {path} failed: {message}")]
    ApiRequest {
        path: String,
        message: String,
        /// HTTP status when the server answered, `None` for network/decode failures
        status: Option<u16>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HelkiError {
    /// Build an [`HelkiError::ApiRequest`] for `path`.
    pub fn api_request(
        path: impl Into<String>,
        message: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self::ApiRequest { path: path.into(), message: message.into(), status }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::TransientTransport(_) => ErrorCategory::Transient,
            Self::ApiRequest { .. } => ErrorCategory::Request,
            Self::Config(_) | Self::InvalidInput(_) => ErrorCategory::Config,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether trying the same operation again later may succeed.
    ///
    /// Polling callers use this to skip a cycle instead of giving up on a
    /// device. Authentication failures count as transient because the next
    /// call re-runs the grant from scratch.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Authentication(_) | Self::TransientTransport(_) => true,
            Self::ApiRequest { status, .. } => match status {
                None => true,
                Some(code) => *code == 429 || *code >= 500,
            },
            Self::Config(_) | Self::InvalidInput(_) | Self::Internal(_) => false,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, HelkiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_request_display_names_path_and_cause() {
        let err = HelkiError::api_request("devs", "connection refused", None);
        assert_eq!(err.to_string(), "API request to devs failed: connection refused");
    }

    #[test]
    fn categories() {
        assert_eq!(
            HelkiError::Authentication("x".into()).category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            HelkiError::TransientTransport("x".into()).category(),
            ErrorCategory::Transient
        );
        assert_eq!(HelkiError::api_request("p", "m", Some(500)).category(), ErrorCategory::Request);
        assert_eq!(HelkiError::InvalidInput("x".into()).category(), ErrorCategory::Config);
    }

    #[test]
    fn transient_classification() {
        assert!(HelkiError::api_request("p", "m", None).is_transient());
        assert!(HelkiError::api_request("p", "m", Some(503)).is_transient());
        assert!(HelkiError::api_request("p", "m", Some(429)).is_transient());
        assert!(!HelkiError::api_request("p", "m", Some(404)).is_transient());
        assert!(!HelkiError::Config("bad".into()).is_transient());
    }
}

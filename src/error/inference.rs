// Inference collaborator error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Inference error code constants
///
/// Error code range: 3001-3004
pub struct InferenceErrorCodes {}

impl InferenceErrorCodes {
    /// Backend could not be reached or timed out
    pub const UNAVAILABLE: i32 = 3001;

    /// Backend answered with a non-success status
    pub const REJECTED: i32 = 3002;

    /// Backend answered but the payload is not a 4-class probability vector
    pub const INVALID_OUTPUT: i32 = 3003;

    /// No inference backend configured
    pub const NOT_CONFIGURED: i32 = 3004;
}

/// Log an inference error with structured context
pub fn log_inference_error(err: &InferenceError, context: &str) {
    error!(
        "Inference error in {}: code={}, component=InferenceAdapter, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Failures reported by an [`InferenceAdapter`](crate::inference::InferenceAdapter)
///
/// Never retried inside the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// Transport failure or timeout talking to the backend
    Unavailable { details: String },

    /// Backend refused the request
    Rejected { status: u16, body: String },

    /// Backend output could not be interpreted
    InvalidOutput { reason: String },

    /// Pipeline was asked to classify without a backend endpoint
    NotConfigured,
}

impl InferenceError {
    /// Whether the failure is a transient collaborator problem (worth retrying
    /// at the caller level) as opposed to a deterministic rejection.
    pub fn is_transient(&self) -> bool {
        matches!(self, InferenceError::Unavailable { .. })
            || matches!(self, InferenceError::Rejected { status, .. } if *status >= 500)
    }
}

impl ErrorCode for InferenceError {
    fn code(&self) -> i32 {
        match self {
            InferenceError::Unavailable { .. } => InferenceErrorCodes::UNAVAILABLE,
            InferenceError::Rejected { .. } => InferenceErrorCodes::REJECTED,
            InferenceError::InvalidOutput { .. } => InferenceErrorCodes::INVALID_OUTPUT,
            InferenceError::NotConfigured => InferenceErrorCodes::NOT_CONFIGURED,
        }
    }

    fn message(&self) -> String {
        match self {
            InferenceError::Unavailable { details } => {
                format!("Inference backend unavailable: {}", details)
            }
            InferenceError::Rejected { status, body } => {
                format!("Inference backend rejected request (HTTP {}): {}", status, body)
            }
            InferenceError::InvalidOutput { reason } => {
                format!("Invalid inference output: {}", reason)
            }
            InferenceError::NotConfigured => "No inference endpoint configured".to_string(),
        }
    }
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InferenceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for InferenceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(InferenceError::Unavailable {
            details: "connection refused".to_string()
        }
        .is_transient());
        assert!(InferenceError::Rejected {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!InferenceError::Rejected {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!InferenceError::InvalidOutput {
            reason: "len 3".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_inference_error_codes() {
        assert_eq!(InferenceError::NotConfigured.code(), 3004);
        assert_eq!(
            InferenceError::Rejected {
                status: 400,
                body: String::new()
            }
            .code(),
            3002
        );
    }
}

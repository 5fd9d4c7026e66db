// Error types for the cough preprocessing pipeline
//
// This module defines custom error types for decoding, filtering, inference and
// pipeline orchestration, each carrying a stable numeric code for callers that
// map failures onto transport-level responses.

mod decode;
mod filter;
mod inference;

pub use decode::{log_decode_error, DecodeError, DecodeErrorCodes};
pub use filter::{log_filter_error, FilterError, FilterErrorCodes};
pub use inference::{log_inference_error, InferenceError, InferenceErrorCodes};

use log::error;
use std::fmt;

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the pipeline boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Pipeline-level error code constants (range 4001-4002)
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// A configuration value is out of range
    pub const INVALID_CONFIG: i32 = 4001;

    /// Onset lies past the end of the recording, leaving nothing to segment
    pub const EMPTY_SEGMENT: i32 = 4002;
}

/// Log a pipeline error with structured context
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!(
        "Pipeline error in {}: code={}, component=CoughPipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Any failure that aborts a pipeline invocation
///
/// Fail-fast: no partial result accompanies an error.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Unreadable or unsupported input
    Decode(DecodeError),

    /// Low-pass filter misconfiguration
    Filter(FilterError),

    /// Classifier collaborator failure
    Inference(InferenceError),

    /// Configuration value rejected by validation
    InvalidConfig { field: String, reason: String },

    /// Segment window starts beyond the last sample
    EmptySegment { start_sample: usize, available: usize },
}

impl PipelineError {
    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        PipelineError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the caller supplied bad input (as opposed to a deployment
    /// or collaborator problem).
    pub fn is_caller_misuse(&self) -> bool {
        matches!(self, PipelineError::Decode(_))
    }

    /// True when the failure came from an unavailable collaborator.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Inference(err) if err.is_transient())
    }
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::Decode(err) => err.code(),
            PipelineError::Filter(err) => err.code(),
            PipelineError::Inference(err) => err.code(),
            PipelineError::InvalidConfig { .. } => PipelineErrorCodes::INVALID_CONFIG,
            PipelineError::EmptySegment { .. } => PipelineErrorCodes::EMPTY_SEGMENT,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::Decode(err) => err.message(),
            PipelineError::Filter(err) => err.message(),
            PipelineError::Inference(err) => err.message(),
            PipelineError::InvalidConfig { field, reason } => {
                format!("Invalid configuration for {}: {}", field, reason)
            }
            PipelineError::EmptySegment {
                start_sample,
                available,
            } => format!(
                "Segment start {} is beyond the {} available samples",
                start_sample, available
            ),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Decode(err) => write!(f, "{}", err),
            PipelineError::Filter(err) => write!(f, "{}", err),
            PipelineError::Inference(err) => write!(f, "{}", err),
            other => write!(
                f,
                "PipelineError::{:?} (code {}): {}",
                other,
                other.code(),
                other.message()
            ),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Decode(err) => Some(err),
            PipelineError::Filter(err) => Some(err),
            PipelineError::Inference(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DecodeError> for PipelineError {
    fn from(err: DecodeError) -> Self {
        PipelineError::Decode(err)
    }
}

impl From<FilterError> for PipelineError {
    fn from(err: FilterError) -> Self {
        PipelineError::Filter(err)
    }
}

impl From<InferenceError> for PipelineError {
    fn from(err: InferenceError) -> Self {
        PipelineError::Inference(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_codes_are_preserved() {
        let err: PipelineError = DecodeError::EmptyAudio.into();
        assert_eq!(err.code(), DecodeErrorCodes::EMPTY_AUDIO);

        let err: PipelineError = InferenceError::NotConfigured.into();
        assert_eq!(err.code(), InferenceErrorCodes::NOT_CONFIGURED);

        let err = PipelineError::invalid_config("onset.hop_length", "must be > 0");
        assert_eq!(err.code(), 4001);
        assert!(err.message().contains("onset.hop_length"));
    }

    #[test]
    fn test_caller_misuse_vs_transient() {
        let decode: PipelineError = DecodeError::InvalidSampleRate.into();
        assert!(decode.is_caller_misuse());
        assert!(!decode.is_transient());

        let unavailable: PipelineError = InferenceError::Unavailable {
            details: "timeout".to_string(),
        }
        .into();
        assert!(!unavailable.is_caller_misuse());
        assert!(unavailable.is_transient());
    }

    #[test]
    fn test_error_code_trait() {
        let err: &dyn ErrorCode = &PipelineError::EmptySegment {
            start_sample: 10,
            available: 5,
        };
        assert_eq!(err.code(), 4002);
        assert!(err.message().contains("10"));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;
        let err: PipelineError = DecodeError::EmptyAudio.into();
        assert!(err.source().is_some());
    }
}

// Decode error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Decode error code constants
///
/// Error code range: 1001-1006
pub struct DecodeErrorCodes {}

impl DecodeErrorCodes {
    /// Input file could not be read
    pub const IO: i32 = 1001;

    /// Container is not the expected one (e.g. FLAC when WAV was expected)
    pub const UNSUPPORTED_CONTAINER: i32 = 1002;

    /// Container header or sample data is corrupt
    pub const MALFORMED: i32 = 1003;

    /// Sample encoding (bit depth / format) is not supported
    pub const UNSUPPORTED_ENCODING: i32 = 1004;

    /// Decoded stream has no samples
    pub const EMPTY_AUDIO: i32 = 1005;

    /// Declared sample rate is zero
    pub const INVALID_SAMPLE_RATE: i32 = 1006;
}

/// Log a decode error with structured context
pub fn log_decode_error(err: &DecodeError, context: &str) {
    error!(
        "Decode error in {}: code={}, component=Loader, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while turning an input recording into a [`Waveform`].
///
/// All variants are caller-side problems (bad or unsupported input) and abort
/// the pipeline before any numeric stage runs.
///
/// [`Waveform`]: crate::audio::Waveform
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Reading the input failed
    Io { details: String },

    /// Magic bytes identify a container other than the expected one
    UnsupportedContainer { expected: String, detected: String },

    /// The container parser rejected the data
    Malformed { details: String },

    /// Bit depth or sample format has no decoding path
    UnsupportedEncoding { details: String },

    /// Input decoded to zero samples
    EmptyAudio,

    /// Input declared a sample rate of 0 Hz
    InvalidSampleRate,
}

impl ErrorCode for DecodeError {
    fn code(&self) -> i32 {
        match self {
            DecodeError::Io { .. } => DecodeErrorCodes::IO,
            DecodeError::UnsupportedContainer { .. } => DecodeErrorCodes::UNSUPPORTED_CONTAINER,
            DecodeError::Malformed { .. } => DecodeErrorCodes::MALFORMED,
            DecodeError::UnsupportedEncoding { .. } => DecodeErrorCodes::UNSUPPORTED_ENCODING,
            DecodeError::EmptyAudio => DecodeErrorCodes::EMPTY_AUDIO,
            DecodeError::InvalidSampleRate => DecodeErrorCodes::INVALID_SAMPLE_RATE,
        }
    }

    fn message(&self) -> String {
        match self {
            DecodeError::Io { details } => format!("Failed to read audio input: {}", details),
            DecodeError::UnsupportedContainer { expected, detected } => {
                format!(
                    "Unsupported container: expected {}, found {}",
                    expected, detected
                )
            }
            DecodeError::Malformed { details } => format!("Malformed audio data: {}", details),
            DecodeError::UnsupportedEncoding { details } => {
                format!("Unsupported sample encoding: {}", details)
            }
            DecodeError::EmptyAudio => "Audio input contains no samples".to_string(),
            DecodeError::InvalidSampleRate => "Sample rate must be greater than 0".to_string(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DecodeError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DecodeError {}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::Io {
            details: err.to_string(),
        }
    }
}

impl From<hound::Error> for DecodeError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => DecodeError::Io {
                details: io.to_string(),
            },
            hound::Error::Unsupported => DecodeError::UnsupportedEncoding {
                details: "hound does not support this WAV variant".to_string(),
            },
            other => DecodeError::Malformed {
                details: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_codes() {
        assert_eq!(
            DecodeError::Io {
                details: "x".to_string()
            }
            .code(),
            1001
        );
        assert_eq!(
            DecodeError::UnsupportedContainer {
                expected: "WAV".to_string(),
                detected: "FLAC".to_string()
            }
            .code(),
            1002
        );
        assert_eq!(DecodeError::EmptyAudio.code(), 1005);
        assert_eq!(DecodeError::InvalidSampleRate.code(), 1006);
    }

    #[test]
    fn test_unsupported_container_message_names_both_formats() {
        let err = DecodeError::UnsupportedContainer {
            expected: "WAV".to_string(),
            detected: "FLAC".to_string(),
        };
        assert!(err.message().contains("WAV"));
        assert!(err.message().contains("FLAC"));
    }

    #[test]
    fn test_hound_unsupported_maps_to_encoding() {
        let err: DecodeError = hound::Error::Unsupported.into();
        assert_eq!(err.code(), DecodeErrorCodes::UNSUPPORTED_ENCODING);
    }
}

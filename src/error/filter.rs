// Filter design error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Filter error code constants
///
/// Error code range: 2001
pub struct FilterErrorCodes {}

impl FilterErrorCodes {
    /// Cutoff, order, or resulting pole placement is unusable
    pub const INVALID_FILTER_PARAMETERS: i32 = 2001;
}

/// Log a filter error with structured context
pub fn log_filter_error(err: &FilterError, context: &str) {
    error!(
        "Filter error in {}: code={}, component=LowPassFilter, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Low-pass filter design errors
///
/// These indicate a deployment misconfiguration rather than bad input data.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Cutoff/order/sample-rate combination cannot produce a stable filter
    InvalidFilterParameters {
        cutoff_hz: f64,
        order: usize,
        sample_rate: u32,
        reason: String,
    },
}

impl ErrorCode for FilterError {
    fn code(&self) -> i32 {
        match self {
            FilterError::InvalidFilterParameters { .. } => {
                FilterErrorCodes::INVALID_FILTER_PARAMETERS
            }
        }
    }

    fn message(&self) -> String {
        match self {
            FilterError::InvalidFilterParameters {
                cutoff_hz,
                order,
                sample_rate,
                reason,
            } => format!(
                "Invalid filter parameters (cutoff={} Hz, order={}, sample_rate={} Hz): {}",
                cutoff_hz, order, sample_rate, reason
            ),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FilterError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for FilterError {}

//! Validation errors for observations, readings and engine configuration.
//!
//! `Rejected` and `NoBaseline` are ordinary correction outcomes and never appear here.
//! Everything in this module means the input was malformed and correction must not be
//! attempted with it.

use thiserror::Error;

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Observation length differs from the meter's configured segment count
    #[error("observation has {actual} digit positions, meter is configured for {expected}")]
    SegmentCountMismatch { expected: usize, actual: usize },

    #[error("no digit candidates at position {position}")]
    EmptyCandidates { position: usize },

    #[error("unknown digit label '{label}' at position {position}")]
    UnknownLabel { position: usize, label: String },

    #[error("confidence {confidence} at position {position} is outside [0, 1]")]
    ConfidenceOutOfRange { position: usize, confidence: f64 },

    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    /// A stored or manual reading has more digits than the meter has wheels
    #[error("reading {value} does not fit in {segments} digits")]
    ReadingExceedsSegments { value: u64, segments: usize },

    #[error("segment count {segments} is outside the supported range 1..={max}")]
    UnsupportedSegmentCount { segments: usize, max: usize },

    #[error("max flow rate {0} must be a positive finite number")]
    InvalidMaxFlowRate(f64),
}

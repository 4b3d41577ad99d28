use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Widest dial supported; keeps every digit prefix inside `u64`.
pub const MAX_SEGMENTS: usize = 18;

/// How the gap between the last reading and a new observation is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElapsedTimeMode {
    /// Only the seconds-of-day part of the gap; whole days are dropped.
    /// A gap of 1 day and 5 minutes counts as 5 minutes.
    #[default]
    SecondsComponent,
    /// The full gap.
    TotalDuration,
}

/// Configuration for the correction engine with tunable thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionConfig {
    /// Number of digit wheels; observations must have exactly this many positions
    pub segments: usize,

    /// Allow the corrected value to fall below the last reading when that reading was
    /// a low-confidence misread
    pub allow_negative_correction: bool,

    /// Plausibility bound in volume units per hour
    pub max_flow_rate: f64,

    pub elapsed_time_mode: ElapsedTimeMode,

    /// Once a negative correction is active, later digits only need this cumulative confidence
    pub negative_continuation_min_confidence: f64,

    /// Cumulative confidence required to start a negative correction
    pub negative_correction_min_confidence: f64,

    /// The last reading must be below this confidence before it may be corrected downwards
    pub low_confidence_threshold: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            segments: 7,
            allow_negative_correction: false,
            max_flow_rate: 1.0,
            elapsed_time_mode: ElapsedTimeMode::default(),
            negative_continuation_min_confidence: 0.15,
            negative_correction_min_confidence: 0.50,
            low_confidence_threshold: 0.2,
        }
    }
}

impl CorrectionConfig {
    pub fn with_segments(segments: usize) -> Self {
        Self {
            segments,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.segments == 0 || self.segments > MAX_SEGMENTS {
            return Err(ValidationError::UnsupportedSegmentCount {
                segments: self.segments,
                max: MAX_SEGMENTS,
            });
        }
        if !self.max_flow_rate.is_finite() || self.max_flow_rate <= 0.0 {
            return Err(ValidationError::InvalidMaxFlowRate(self.max_flow_rate));
        }
        Ok(())
    }
}

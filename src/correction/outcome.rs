use serde::{Deserialize, Serialize};

/// A reading the engine accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectedReading {
    pub value: u64,
    pub confidence: f64,
    /// Volume units per minute
    pub flow_rate: f64,
    /// The value was re-anchored against the second-to-last reading
    pub negative_correction: bool,
    /// The observation was not newer than the last reading, so the current time was used
    /// to measure elapsed time
    pub clock_skew: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RejectReason {
    /// No candidate satisfied the monotonicity rules at these positions
    DigitFallback { positions: Vec<usize> },
    FlowRateExceeded { flow_rate: f64, limit: f64 },
    NegativeFlow { flow_rate: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CorrectionOutcome {
    /// No accepted reading exists yet; a baseline must be entered manually.
    NoBaseline,
    /// The observation is implausible; keep the last reading.
    Rejected {
        reason: RejectReason,
        /// Fully computed value, kept for diagnostics only
        candidate_value: u64,
    },
    Accepted(CorrectedReading),
}

impl CorrectionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CorrectionOutcome::Accepted(_))
    }

    pub fn accepted(&self) -> Option<&CorrectedReading> {
        match self {
            CorrectionOutcome::Accepted(reading) => Some(reading),
            _ => None,
        }
    }
}

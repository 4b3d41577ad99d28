//! Evaluation log entries.
//!
//! Every processed observation leaves one record, whatever the outcome, so rejected
//! readings can be inspected after the fact. The outcome is kept as raw JSON because
//! flow rates may be infinite, which JSON cannot round-trip as a number. The ranked
//! candidates of the observation are stored next to it so a digit fallback can be traced
//! back to the classifier output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DigitCandidate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    pub id: i64,
    pub name: String,
    pub observed_at: DateTime<Utc>,
    pub outcome: serde_json::Value,
    /// Candidate lists per position, most significant first
    pub predictions: Vec<Vec<DigitCandidate>>,
    pub created_at: DateTime<Utc>,
}

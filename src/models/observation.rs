//! Digit observation data model.
//!
//! An observation is what the digit classifier reports for one captured image: one
//! ranked candidate list per digit wheel, most-significant wheel first, plus the capture
//! timestamp. Candidate order is authoritative and is never re-sorted.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Classifier label for a wheel caught between two digits.
pub const ROTATION_LABEL: &str = "r";

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DigitLabel {
    Digit(u8),
    RotationMarker,
}

impl DigitLabel {
    /// Parses the classifier's wire label (`"0"`..`"9"` or `"r"`).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == ROTATION_LABEL {
            return Some(DigitLabel::RotationMarker);
        }

        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c.to_digit(10).map(|d| DigitLabel::Digit(d as u8)),
            _ => None,
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            DigitLabel::Digit(d) => *d <= 9,
            DigitLabel::RotationMarker => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitCandidate {
    pub label: DigitLabel,
    pub confidence: f64,
}

impl DigitCandidate {
    pub fn digit(digit: u8, confidence: f64) -> Self {
        Self {
            label: DigitLabel::Digit(digit),
            confidence,
        }
    }

    pub fn rotation(confidence: f64) -> Self {
        Self {
            label: DigitLabel::RotationMarker,
            confidence,
        }
    }
}

/// A validated observation. Every position has at least one candidate, every label is
/// in the classifier alphabet and every confidence lies in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    positions: Vec<Vec<DigitCandidate>>,
    timestamp: DateTime<Utc>,
}

impl Observation {
    pub fn new(
        positions: Vec<Vec<DigitCandidate>>,
        timestamp: DateTime<Utc>,
    ) -> ValidationResult<Self> {
        for (position, candidates) in positions.iter().enumerate() {
            if candidates.is_empty() {
                return Err(ValidationError::EmptyCandidates { position });
            }

            for candidate in candidates {
                if !candidate.label.is_valid() {
                    return Err(ValidationError::UnknownLabel {
                        position,
                        label: format!("{:?}", candidate.label),
                    });
                }
                if !(0.0..=1.0).contains(&candidate.confidence) {
                    return Err(ValidationError::ConfidenceOutOfRange {
                        position,
                        confidence: candidate.confidence,
                    });
                }
            }
        }

        Ok(Self {
            positions,
            timestamp,
        })
    }

    pub fn positions(&self) -> &[Vec<DigitCandidate>] {
        &self.positions
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn segment_count(&self) -> usize {
        self.positions.len()
    }
}

/// Observation as delivered by the classifier: string labels and a textual timestamp.
///
/// ```json
/// { "predictions": [[["0", 0.91], ["r", 0.06]], [["4", 0.8]]], "timestamp": "2024-05-01T10:15:00Z" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    pub predictions: Vec<Vec<(String, f64)>>,
    pub timestamp: String,
}

impl RawObservation {
    pub fn into_observation(self) -> ValidationResult<Observation> {
        let timestamp = parse_timestamp(&self.timestamp)?;

        let positions = self
            .predictions
            .into_iter()
            .enumerate()
            .map(|(position, candidates)| {
                candidates
                    .into_iter()
                    .map(|(label, confidence)| {
                        let parsed = DigitLabel::parse(&label)
                            .ok_or(ValidationError::UnknownLabel { position, label })?;
                        Ok(DigitCandidate {
                            label: parsed,
                            confidence,
                        })
                    })
                    .collect::<ValidationResult<Vec<_>>>()
            })
            .collect::<ValidationResult<Vec<_>>>()?;

        Observation::new(positions, timestamp)
    }
}

/// Parses RFC 3339 timestamps, falling back to offset-less ISO 8601 which is taken as UTC.
pub fn parse_timestamp(value: &str) -> ValidationResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValidationError::InvalidTimestamp {
            value: value.to_string(),
        })
}

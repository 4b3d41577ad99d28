//! Accepted meter readings and the per-meter history window the engine reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confidence assigned to readings entered by hand.
pub const MANUAL_CONFIDENCE: f64 = 1.0;

/// An accepted reading. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Integer meter value; its zero-padded decimal form is the digit string.
    pub value: u64,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub manual: bool,
}

impl Reading {
    pub fn new(value: u64, timestamp: DateTime<Utc>, confidence: f64) -> Self {
        Self {
            value,
            timestamp,
            confidence,
            manual: false,
        }
    }

    pub fn manual(value: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            timestamp,
            confidence: MANUAL_CONFIDENCE,
            manual: true,
        }
    }
}

/// A stored reading together with its row id and meter name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub name: String,
    pub reading: Reading,
}

/// The two most recent accepted readings of one meter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeterHistory {
    pub last: Option<Reading>,
    pub second_last: Option<Reading>,
}

impl MeterHistory {
    pub fn new(last: Reading, second_last: Option<Reading>) -> Self {
        Self {
            last: Some(last),
            second_last,
        }
    }

    /// Builds the window from readings ordered most-recent-first. Extra entries are ignored.
    pub fn from_recent(recent: Vec<Reading>) -> Self {
        let mut iter = recent.into_iter();
        let last = iter.next();
        let second_last = iter.next();
        Self { last, second_last }
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }
}

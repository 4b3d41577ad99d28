//! Per-meter settings stored alongside the reading history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterSettings {
    pub name: String,
    /// Number of digit wheels on the dial
    pub segments: usize,
    /// Volume units per hour
    pub max_flow_rate: f64,
    pub updated_at: DateTime<Utc>,
}

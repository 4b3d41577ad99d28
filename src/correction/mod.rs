pub mod algorithm;
pub mod config;
pub mod digits;
pub mod flow;
pub mod outcome;

pub use algorithm::CorrectionEngine;
pub use config::{CorrectionConfig, ElapsedTimeMode, MAX_SEGMENTS};
pub use outcome::{CorrectedReading, CorrectionOutcome, RejectReason};

//! Monotonic reading correction for camera-read water meters.
//!
//! The digit classifier reports, for every wheel of the dial, a ranked list of candidate
//! digits. [`CorrectionEngine`] reconciles that observation with the meter's last
//! accepted readings under the rule that the reading only goes up, and by no more than
//! the configured flow rate allows. [`ReadingProcessor`] wires the engine to the SQLite
//! history store.

pub mod alerts;
pub mod correction;
pub mod db;
pub mod error;
pub mod models;
pub mod processor;
pub mod settings;
mod utils;

pub use alerts::AlertRegistry;
pub use correction::{
    CorrectedReading, CorrectionConfig, CorrectionEngine, CorrectionOutcome, ElapsedTimeMode,
    RejectReason,
};
pub use db::Database;
pub use error::ValidationError;
pub use models::{
    DigitCandidate, DigitLabel, MeterHistory, Observation, RawObservation, Reading,
};
pub use processor::ReadingProcessor;
pub use settings::{CorrectionSettings, SettingsStore};
pub use utils::logging::init_logging;

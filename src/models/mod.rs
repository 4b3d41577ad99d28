pub mod evaluation;
pub mod meter_settings;
pub mod observation;
pub mod reading;

pub use evaluation::EvaluationRecord;
pub use meter_settings::MeterSettings;
pub use observation::{parse_timestamp, DigitCandidate, DigitLabel, Observation, RawObservation};
pub use reading::{HistoryEntry, MeterHistory, Reading};

pub mod controller;
pub mod locks;

pub use controller::{baseline_alert_key, ReadingProcessor};
pub use locks::MeterLocks;

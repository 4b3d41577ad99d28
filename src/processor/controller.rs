use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::info;

use crate::{
    alerts::AlertRegistry,
    correction::{digits::zero_padded_digits, CorrectionConfig, CorrectionEngine, CorrectionOutcome},
    db::Database,
    models::{HistoryEntry, MeterSettings, Observation, RawObservation, Reading},
    settings::{CorrectionSettings, SettingsStore},
};

use super::MeterLocks;

/// Alert key raised while a meter has no baseline reading.
pub fn baseline_alert_key(meter: &str) -> String {
    format!("baseline:{meter}")
}

/// Runs observations through the correction engine and records the results.
///
/// Every operation that reads or writes a meter's history holds that meter's lock for
/// its whole duration, so the engine always sees the true last two readings.
#[derive(Clone)]
pub struct ReadingProcessor {
    db: Database,
    settings: Arc<SettingsStore>,
    alerts: AlertRegistry,
    locks: MeterLocks,
}

impl ReadingProcessor {
    pub fn new(db: Database, settings: Arc<SettingsStore>, alerts: AlertRegistry) -> Self {
        Self {
            db,
            settings,
            alerts,
            locks: MeterLocks::new(),
        }
    }

    pub fn alerts(&self) -> &AlertRegistry {
        &self.alerts
    }

    /// Stores dial geometry and flow bound for a meter after validating them.
    pub async fn configure_meter(
        &self,
        meter: &str,
        segments: usize,
        max_flow_rate: f64,
    ) -> Result<MeterSettings> {
        CorrectionConfig {
            segments,
            max_flow_rate,
            ..CorrectionConfig::default()
        }
        .validate()?;

        let settings = MeterSettings {
            name: meter.to_string(),
            segments,
            max_flow_rate,
            updated_at: Utc::now(),
        };
        self.db.upsert_meter_settings(&settings).await?;
        info!("Configured meter {meter}: {segments} segments, max flow {max_flow_rate}/h");
        Ok(settings)
    }

    pub async fn process_raw(
        &self,
        meter: &str,
        observation: RawObservation,
    ) -> Result<CorrectionOutcome> {
        let observation = observation.into_observation()?;
        self.process(meter, &observation).await
    }

    /// Fetch history → correct → persist, serialised per meter.
    pub async fn process(&self, meter: &str, observation: &Observation) -> Result<CorrectionOutcome> {
        let _guard = self.locks.acquire(meter).await;

        let settings = self.settings.correction();
        let engine = self.engine_for(meter, &settings).await?;
        let history = self.db.last_two_readings(meter).await?;

        let outcome = engine.correct(meter, &history, observation)?;

        // The observation's own timestamp is stored even when elapsed time was measured
        // against the wall clock.
        let accepted = outcome.accepted().map(|corrected| {
            Reading::new(corrected.value, observation.timestamp(), corrected.confidence)
        });

        self.db
            .record_outcome(
                meter,
                observation,
                &outcome,
                accepted.as_ref(),
                settings.max_history,
                settings.max_evaluations,
            )
            .await?;

        if outcome == CorrectionOutcome::NoBaseline {
            self.alerts.add(
                baseline_alert_key(meter),
                format!("Meter {meter} has no baseline reading; enter the current value manually"),
            );
        }

        Ok(outcome)
    }

    /// Seeds or overrides the baseline with a hand-entered value.
    pub async fn add_manual_reading(
        &self,
        meter: &str,
        value: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<Reading> {
        let _guard = self.locks.acquire(meter).await;

        if let Some(meter_settings) = self.db.get_meter_settings(meter).await? {
            zero_padded_digits(value, meter_settings.segments)?;
        }

        let settings = self.settings.correction();
        let reading = Reading::manual(value, timestamp);
        self.db
            .insert_reading(meter, &reading, settings.max_history)
            .await?;
        self.alerts.remove(&baseline_alert_key(meter));

        info!("Manual reading {value} stored for meter {meter}");
        Ok(reading)
    }

    pub async fn history(&self, meter: &str) -> Result<Vec<HistoryEntry>> {
        self.db.list_history(meter).await
    }

    /// Drops all readings of a meter; the next observation will need a new baseline.
    pub async fn reset_meter(&self, meter: &str) -> Result<usize> {
        let guard = self.locks.acquire(meter).await;
        let removed = self.db.clear_history(meter).await?;
        drop(guard);
        self.locks.forget(meter);
        info!("Cleared {removed} readings for meter {meter}");
        Ok(removed)
    }

    async fn engine_for(
        &self,
        meter: &str,
        settings: &CorrectionSettings,
    ) -> Result<CorrectionEngine> {
        let meter_settings = self
            .db
            .get_meter_settings(meter)
            .await?
            .ok_or_else(|| anyhow!("meter {meter} has no settings configured"))?;

        Ok(CorrectionEngine::new(settings.engine_config(&meter_settings))?)
    }
}

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::correction::{CorrectionConfig, ElapsedTimeMode};
use crate::models::MeterSettings;

/// Settings shared by every meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorrectionSettings {
    pub allow_negative_correction: bool,
    /// Accepted readings kept per meter
    pub max_history: usize,
    /// Evaluation log entries kept per meter
    pub max_evaluations: usize,
    pub elapsed_time_mode: ElapsedTimeMode,
}

impl Default for CorrectionSettings {
    fn default() -> Self {
        Self {
            allow_negative_correction: false,
            max_history: 30,
            max_evaluations: 5,
            elapsed_time_mode: ElapsedTimeMode::default(),
        }
    }
}

impl CorrectionSettings {
    /// Engine configuration for one meter.
    pub fn engine_config(&self, meter: &MeterSettings) -> CorrectionConfig {
        CorrectionConfig {
            segments: meter.segments,
            allow_negative_correction: self.allow_negative_correction,
            max_flow_rate: meter.max_flow_rate,
            elapsed_time_mode: self.elapsed_time_mode,
            ..CorrectionConfig::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    correction: CorrectionSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings file {}: {err}",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn correction(&self) -> CorrectionSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .correction
            .clone()
    }

    pub fn update_correction(&self, settings: CorrectionSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.correction = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
        Ok(())
    }
}

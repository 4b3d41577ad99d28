//! Process-level alert registry.
//!
//! Alerts are keyed messages that surrounding code raises and clears (for example a
//! meter that still needs a manual baseline). The registry is an owned handle; clone it
//! to share one set of alerts between components.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Clone, Default)]
pub struct AlertRegistry {
    alerts: Arc<Mutex<BTreeMap<String, String>>>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises an alert, replacing any message already stored under `key`.
    pub fn add(&self, key: impl Into<String>, message: impl Into<String>) {
        self.lock().insert(key.into(), message.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.lock().remove(key)
    }

    /// Snapshot of all active alerts, ordered by key.
    pub fn list(&self) -> BTreeMap<String, String> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

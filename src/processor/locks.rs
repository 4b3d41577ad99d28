use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per meter name.
///
/// Holding the guard gives the holder exclusive use of the meter's
/// "fetch history → correct → persist" sequence. Different meters never contend.
#[derive(Clone, Default)]
pub struct MeterLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl MeterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, meter: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(meter.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drops the lock of a meter nobody is using any more.
    ///
    /// A lock that is held or awaited stays in place, so the map only shrinks for idle
    /// meters. Without this the map grows with every meter name ever seen.
    pub fn forget(&self, meter: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(meter)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(meter);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

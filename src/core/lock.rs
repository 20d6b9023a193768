//! In-process period close locks, one async mutex per agreement.
//!
//! Closing a period holds the agreement's lock for the whole close transaction, so two
//! closes for the same agreement are serialized. Waiting longer than the configured
//! timeout fails with `ConcurrencyConflict` instead of hanging. Across processes the
//! close additionally relies on the row lock and the `status = 'OPEN'` guard on the
//! close write.

use crate::errors::{Error, Result};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Default wait before a contended close gives up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

type Slot = Arc<AsyncMutex<()>>;
type Slots = Arc<Mutex<HashMap<i64, Slot>>>;

/// Registry of per-agreement close locks. Cloning shares the registry.
///
/// An agreement's entry lives only while someone holds or waits for its lock.
#[derive(Debug, Clone)]
pub struct PeriodLocks {
    slots: Slots,
    wait_timeout: Duration,
}

/// Held for the duration of a close; dropping it releases the agreement.
#[derive(Debug)]
pub struct PeriodLockGuard {
    agreement_id: i64,
    slots: Slots,
    guard: OwnedMutexGuard<()>,
}

impl PeriodLockGuard {
    #[must_use]
    pub const fn agreement_id(&self) -> i64 {
        self.agreement_id
    }
}

impl Drop for PeriodLockGuard {
    fn drop(&mut self) {
        prune_slot(&self.slots, self.agreement_id, OwnedMutexGuard::mutex(&self.guard));
    }
}

/// Removes `agreement_id`'s entry if `slot` is its only user besides the map.
fn prune_slot(slots: &Slots, agreement_id: i64, slot: &Slot) {
    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
    let idle = slots
        .get(&agreement_id)
        .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(current) <= 2);
    if idle {
        slots.remove(&agreement_id);
    }
}

impl Default for PeriodLocks {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl PeriodLocks {
    #[must_use]
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            wait_timeout,
        }
    }

    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Number of agreements currently holding or waiting on a close lock.
    #[must_use]
    pub fn tracked_agreements(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Acquires the close lock scoped to `agreement_id`'s open period.
    pub async fn acquire(&self, agreement_id: i64) -> Result<PeriodLockGuard> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(agreement_id).or_default())
        };

        let acquired = tokio::time::timeout(self.wait_timeout, Arc::clone(&slot).lock_owned()).await;
        let Ok(guard) = acquired else {
            // The holder may have released between our timeout and now.
            prune_slot(&self.slots, agreement_id, &slot);
            return Err(Error::ConcurrencyConflict {
                message: format!(
                    "timed out after {}ms waiting to close the open period of agreement {agreement_id}",
                    self.wait_timeout.as_millis()
                ),
            });
        };
        drop(slot);

        debug!(agreement_id, "Acquired period close lock");
        Ok(PeriodLockGuard {
            agreement_id,
            slots: Arc::clone(&self.slots),
            guard,
        })
    }
}

//! Per-reminder mutual exclusion.
//!
//! Every read-mutate-(re)arm-write sequence on a reminder runs inside
//! [`KeyedLocks::with`] for that reminder's id, so a fire racing a delete or
//! snooze cannot lose an update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::reminder::ReminderId;

#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<ReminderId, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `id`.
    pub fn with<R>(&self, id: ReminderId, f: impl FnOnce() -> R) -> R {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(id).or_default())
        };
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Drop the slot of a deleted reminder.
    pub fn forget(&self, id: ReminderId) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

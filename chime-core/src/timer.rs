//! Timer primitive contract and the adapter that binds reminders to it.
//!
//! A registration fires by emitting a [`FireEvent`] naming the reminder and
//! the handle that fired. Nothing mutable about the reminder is captured at
//! arm time: the fire handler reloads it from the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::error::Result;
use crate::reminder::{ChatId, Reminder, ReminderId, TimerHandle};
use crate::schedule::RecurrenceExpr;
use crate::store::ChatPreferenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FireTarget {
    pub chat_id: ChatId,
    pub reminder_id: ReminderId,
}

impl FireTarget {
    pub fn of(reminder: &Reminder) -> Self {
        Self {
            chat_id: reminder.chat_id,
            reminder_id: reminder.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireEvent {
    pub target: FireTarget,
    pub handle: TimerHandle,
}

/// Wall-clock timer that evaluates recurrence expressions in a given zone.
///
/// `arm` twice yields two independent registrations. `disarm` on an unknown
/// or already-disarmed handle is a no-op.
pub trait TimerPrimitive: Send + Sync {
    fn arm(&self, expr: &RecurrenceExpr, tz: Tz, target: FireTarget) -> Result<TimerHandle>;
    fn disarm(&self, handle: TimerHandle);
    fn next_fire(&self, handle: TimerHandle) -> Option<DateTime<Utc>>;
    /// Who a live registration fires for.
    fn target(&self, handle: TimerHandle) -> Option<FireTarget>;
}

/// A fresh registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Armed {
    pub handle: TimerHandle,
    pub next_fire_at: Option<DateTime<Utc>>,
    pub timezone: Tz,
}

impl Armed {
    /// Record the registration on the reminder.
    pub fn apply(&self, reminder: &mut Reminder) {
        reminder.timer_handle = Some(self.handle);
        reminder.next_fire_at = self.next_fire_at;
    }
}

pub struct SchedulerAdapter {
    timer: Arc<dyn TimerPrimitive>,
    preferences: Arc<dyn ChatPreferenceStore>,
}

impl SchedulerAdapter {
    pub fn new(timer: Arc<dyn TimerPrimitive>, preferences: Arc<dyn ChatPreferenceStore>) -> Self {
        Self { timer, preferences }
    }

    pub fn chat_timezone(&self, chat_id: ChatId) -> Result<Tz> {
        self.preferences.get_preference(chat_id)?.tz()
    }

    /// Arm the reminder's schedule in its chat's current zone.
    pub fn arm(&self, reminder: &Reminder) -> Result<Armed> {
        let tz = self.chat_timezone(reminder.chat_id)?;
        self.arm_in(reminder, tz)
    }

    pub fn arm_in(&self, reminder: &Reminder, tz: Tz) -> Result<Armed> {
        let handle = self
            .timer
            .arm(&reminder.schedule, tz, FireTarget::of(reminder))?;
        let next_fire_at = self.timer.next_fire(handle);
        debug!(
            reminder_id = reminder.id,
            chat_id = reminder.chat_id,
            schedule = %reminder.schedule,
            timezone = %tz,
            handle = handle.0,
            "armed"
        );
        Ok(Armed {
            handle,
            next_fire_at,
            timezone: tz,
        })
    }

    pub fn next_fire_time(&self, handle: TimerHandle) -> Option<DateTime<Utc>> {
        self.timer.next_fire(handle)
    }

    pub fn disarm(&self, handle: TimerHandle) {
        self.timer.disarm(handle);
    }

    /// Disarm the reminder's stored handle if it is live and fires for this
    /// reminder. Handles persisted by an earlier process may name someone
    /// else's registration in this one.
    pub fn release(&self, reminder: &Reminder) -> bool {
        match reminder.timer_handle {
            Some(handle) if self.holds(reminder) => {
                self.timer.disarm(handle);
                true
            }
            _ => false,
        }
    }

    /// The reminder's stored handle is a live registration firing for it.
    pub fn holds(&self, reminder: &Reminder) -> bool {
        reminder
            .timer_handle
            .is_some_and(|handle| self.timer.target(handle) == Some(FireTarget::of(reminder)))
    }
}

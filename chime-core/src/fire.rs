//! What happens when a registration fires.
//!
//! Three outcomes depending on the reminder's recurrence kind:
//!
//! * calendar recurrence (`run_once == false`): the primitive keeps firing on
//!   its own; only `next_fire_at` is refreshed.
//! * "every N units" (`run_once` with an offset): the schedule is re-pinned
//!   to chat-local now plus the offset and armed under a new handle.
//! * one-shot: the reminder is completed and its registration dropped.
//!
//! Failures are logged and swallowed. There is no caller to report them to,
//! and the handler does not retry.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::locks::KeyedLocks;
use crate::notify::{Notifier, controls_for, notification_text};
use crate::reminder::Reminder;
use crate::schedule::RecurrenceExpr;
use crate::store::ReminderStore;
use crate::time::offset_instant;
use crate::timer::{FireEvent, SchedulerAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Recurring reminder, still armed under the same handle.
    Advanced,
    /// Re-pinned and armed under a new handle.
    Rescheduled,
    Completed,
    /// Stale handle, inactive or missing reminder.
    Ignored,
    /// Delivery failed; nothing was changed.
    Undelivered,
    /// Delivered, but the follow-up transition failed.
    Failed,
}

pub struct FireHandler {
    store: Arc<dyn ReminderStore>,
    adapter: Arc<SchedulerAdapter>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks>,
}

impl FireHandler {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        adapter: Arc<SchedulerAdapter>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            store,
            adapter,
            notifier,
            clock,
            locks,
        }
    }

    pub fn handle(&self, event: FireEvent) -> FireOutcome {
        let target = event.target;
        self.locks.with(target.reminder_id, || {
            let mut reminder = match self.store.get_reminder(target.chat_id, target.reminder_id) {
                Ok(r) if r.chat_id == target.chat_id => r,
                Ok(_) => {
                    warn!(
                        chat_id = target.chat_id,
                        reminder_id = target.reminder_id,
                        "fire target belongs to another chat"
                    );
                    self.adapter.disarm(event.handle);
                    return FireOutcome::Ignored;
                }
                Err(e) if e.is_not_found() => {
                    debug!(reminder_id = target.reminder_id, "fired reminder no longer exists");
                    self.adapter.disarm(event.handle);
                    return FireOutcome::Ignored;
                }
                Err(e) => {
                    error!(
                        chat_id = target.chat_id,
                        reminder_id = target.reminder_id,
                        error = %e,
                        "failed to load fired reminder"
                    );
                    return FireOutcome::Failed;
                }
            };

            if !reminder.is_active() || reminder.timer_handle != Some(event.handle) {
                debug!(
                    reminder_id = reminder.id,
                    handle = event.handle.0,
                    status = ?reminder.status,
                    "ignoring stale fire"
                );
                self.adapter.disarm(event.handle);
                return FireOutcome::Ignored;
            }

            let text = notification_text(&reminder);
            if let Err(e) =
                self.notifier
                    .send(reminder.payload.recipient_id, &text, &controls_for(&reminder))
            {
                warn!(
                    chat_id = reminder.chat_id,
                    reminder_id = reminder.id,
                    error = %e,
                    "reminder delivery failed"
                );
                return FireOutcome::Undelivered;
            }

            match self.transition(&mut reminder, event) {
                Ok(outcome) => {
                    info!(
                        chat_id = reminder.chat_id,
                        reminder_id = reminder.id,
                        outcome = ?outcome,
                        next_fire_at = ?reminder.next_fire_at,
                        "reminder fired"
                    );
                    outcome
                }
                Err(e) => {
                    error!(
                        chat_id = reminder.chat_id,
                        reminder_id = reminder.id,
                        error = %e,
                        "reminder state update after fire failed"
                    );
                    FireOutcome::Failed
                }
            }
        })
    }

    fn transition(&self, reminder: &mut Reminder, event: FireEvent) -> Result<FireOutcome> {
        let now = self.clock.now();
        reminder.last_fired_at = Some(now);

        if !reminder.run_once {
            reminder.next_fire_at = self.adapter.next_fire_time(event.handle);
            self.store.update_reminder(reminder)?;
            return Ok(FireOutcome::Advanced);
        }

        if let Some(offset) = reminder.repeat_offset {
            let tz = self.adapter.chat_timezone(reminder.chat_id)?;
            let at = offset_instant(&offset, tz, now);
            reminder.schedule = RecurrenceExpr::pinned(&at);

            self.adapter.disarm(event.handle);
            reminder.timer_handle = None;
            let armed = self.adapter.arm_in(reminder, tz)?;
            armed.apply(reminder);
            if let Err(e) = self.store.update_reminder(reminder) {
                self.adapter.disarm(armed.handle);
                return Err(e);
            }
            return Ok(FireOutcome::Rescheduled);
        }

        reminder.mark_completed(now);
        self.adapter.disarm(event.handle);
        self.store.update_reminder(reminder)?;
        Ok(FireOutcome::Completed)
    }
}

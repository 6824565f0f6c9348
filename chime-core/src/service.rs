//! Reminder creation and the user-facing operations on existing reminders.
//!
//! Creation persists the record first (the store assigns the id the timer
//! target needs), then arms, then writes the handle back. A failed arm or
//! write deletes the record again and disarms whatever was armed, so a
//! failed command leaves neither a record nor a live timer behind.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{ReminderError, Result};
use crate::locks::KeyedLocks;
use crate::reminder::{ChatId, Reminder, ReminderId, ReminderStatus, RepeatOffset};
use crate::store::ReminderStore;
use crate::time::{CalendarFields, RecurringFields, RelativeDay, TimeSpec, normalize};
use crate::timer::SchedulerAdapter;

/// `Mon, 02 Jan 2006 15:04 MST`, in the chat's zone.
pub const DISPLAY_FORMAT: &str = "%a, %d %b %Y %H:%M %Z";

pub fn format_local(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format(DISPLAY_FORMAT).to_string()
}

/// A freshly armed reminder and when it will first fire.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled {
    pub reminder: Reminder,
    pub at: DateTime<Utc>,
    pub timezone: Tz,
}

impl Scheduled {
    pub fn local(&self) -> DateTime<Tz> {
        self.at.with_timezone(&self.timezone)
    }
}

impl fmt::Display for Scheduled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reminder \"{}\" has been added for {}",
            self.reminder.payload.message,
            format_local(self.at, self.timezone)
        )
    }
}

/// Where a snoozed reminder goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnoozeTarget {
    In(RepeatOffset),
    At(RelativeDay),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub reminder: Reminder,
    pub timezone: Tz,
}

impl Detail {
    pub fn next_fire_local(&self) -> Option<DateTime<Tz>> {
        self.reminder
            .next_fire_at
            .filter(|_| self.reminder.is_active())
            .map(|at| at.with_timezone(&self.timezone))
    }

    pub fn completed_local(&self) -> Option<DateTime<Tz>> {
        self.reminder
            .completed_at
            .map(|at| at.with_timezone(&self.timezone))
    }
}

/// A chat's reminders split by status, each group ordered by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderList {
    pub active: Vec<Reminder>,
    pub inactive: Vec<Reminder>,
    pub completed: Vec<Reminder>,
}

impl ReminderList {
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.inactive.is_empty() && self.completed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.inactive.len() + self.completed.len()
    }
}

#[derive(Debug, Clone, Copy)]
enum Recurrence {
    Once,
    Calendar,
    Every(RepeatOffset),
}

pub struct ReminderService {
    store: Arc<dyn ReminderStore>,
    adapter: Arc<SchedulerAdapter>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks>,
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        adapter: Arc<SchedulerAdapter>,
        clock: Arc<dyn Clock>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            store,
            adapter,
            clock,
            locks,
        }
    }

    /// "on the 1st of december at 8:23", "on tuesday". Fires once.
    pub fn add_on_absolute_fields(
        &self,
        chat_id: ChatId,
        command: &str,
        fields: &CalendarFields,
        message: &str,
    ) -> Result<Scheduled> {
        let spec = TimeSpec::Absolute(fields.clone());
        self.add(chat_id, command, &spec, Recurrence::Once, message)
    }

    /// "today at 21:00", "tomorrow morning". Must be in the future.
    pub fn add_on_relative_keyword(
        &self,
        chat_id: ChatId,
        command: &str,
        day: &RelativeDay,
        message: &str,
    ) -> Result<Scheduled> {
        self.add(chat_id, command, &TimeSpec::Relative(*day), Recurrence::Once, message)
    }

    /// "every tuesday at 8:23", "every 1st of the month".
    pub fn add_on_recurring_fields(
        &self,
        chat_id: ChatId,
        command: &str,
        fields: &RecurringFields,
        message: &str,
    ) -> Result<Scheduled> {
        let spec = TimeSpec::Recurring(fields.clone());
        self.add(chat_id, command, &spec, Recurrence::Calendar, message)
    }

    /// "in 5 minutes".
    pub fn add_in(
        &self,
        chat_id: ChatId,
        command: &str,
        offset: RepeatOffset,
        message: &str,
    ) -> Result<Scheduled> {
        self.add(chat_id, command, &TimeSpec::Offset(offset), Recurrence::Once, message)
    }

    /// "every 2 hours": like [`Self::add_in`], re-pinned after each fire.
    pub fn add_every(
        &self,
        chat_id: ChatId,
        command: &str,
        offset: RepeatOffset,
        message: &str,
    ) -> Result<Scheduled> {
        self.add(
            chat_id,
            command,
            &TimeSpec::Offset(offset),
            Recurrence::Every(offset),
            message,
        )
    }

    fn add(
        &self,
        chat_id: ChatId,
        command: &str,
        spec: &TimeSpec,
        recurrence: Recurrence,
        message: &str,
    ) -> Result<Scheduled> {
        let tz = self.adapter.chat_timezone(chat_id)?;
        let now = self.clock.now();
        let schedule = normalize(spec, tz, now)?.expression();

        let reminder = Reminder::new(chat_id, schedule, command, message, now);
        let reminder = match recurrence {
            Recurrence::Once => reminder,
            Recurrence::Calendar => reminder.recurring(),
            Recurrence::Every(offset) => reminder.repeating_every(offset),
        };
        self.schedule_and_add(reminder)
    }

    fn schedule_and_add(&self, reminder: Reminder) -> Result<Scheduled> {
        let chat_id = reminder.chat_id;
        let id = self.store.create_reminder(&reminder)?;

        self.locks.with(id, || {
            let result = self.arm_created(chat_id, id);
            if result.is_err() {
                self.discard(chat_id, id);
            }
            result
        })
    }

    /// Arm a just-created record. Runs under the record's lock; the record
    /// and the chat zone are read again because a rehydrate or timezone
    /// change may have armed it between the create and the lock.
    fn arm_created(&self, chat_id: ChatId, id: ReminderId) -> Result<Scheduled> {
        let mut reminder = self.store.get_reminder(chat_id, id)?;
        let tz = self.adapter.chat_timezone(chat_id)?;

        if self.adapter.holds(&reminder) {
            if let Some(at) = reminder.next_fire_at {
                debug!(chat_id, reminder_id = id, "reminder already armed by rehydrate");
                return Ok(Scheduled {
                    reminder,
                    at,
                    timezone: tz,
                });
            }
        }
        self.adapter.release(&reminder);
        reminder.timer_handle = None;

        let armed = self.adapter.arm_in(&reminder, tz)?;
        armed.apply(&mut reminder);

        let Some(at) = armed.next_fire_at else {
            self.adapter.disarm(armed.handle);
            return Err(ReminderError::SchedulerArm {
                expression: reminder.schedule.to_string(),
                reason: "expression has no upcoming occurrence".to_string(),
            });
        };

        if let Err(e) = self.store.update_reminder(&reminder) {
            self.adapter.disarm(armed.handle);
            return Err(e);
        }

        info!(
            chat_id,
            reminder_id = id,
            schedule = %reminder.schedule,
            next_fire_at = %at,
            "reminder added"
        );
        Ok(Scheduled {
            reminder,
            at,
            timezone: tz,
        })
    }

    /// Undo a create whose arm or handle write failed.
    fn discard(&self, chat_id: ChatId, id: ReminderId) {
        if let Err(e) = self.store.delete_reminder(chat_id, id) {
            warn!(chat_id, reminder_id = id, error = %e, "could not discard half-created reminder");
        }
        self.locks.forget(id);
    }

    fn owned(&self, chat_id: ChatId, id: ReminderId) -> Result<Reminder> {
        let reminder = self.store.get_reminder(chat_id, id)?;
        if reminder.chat_id != chat_id {
            return Err(ReminderError::Unauthorized {
                chat_id,
                reminder_id: id,
            });
        }
        Ok(reminder)
    }

    pub fn delete_reminder(&self, chat_id: ChatId, id: ReminderId) -> Result<Reminder> {
        let deleted = self.locks.with(id, || {
            let reminder = self.owned(chat_id, id)?;
            if let Some(handle) = reminder.timer_handle {
                self.adapter.disarm(handle);
            }
            self.store.delete_reminder(chat_id, id)?;
            Ok::<_, ReminderError>(reminder)
        })?;
        self.locks.forget(id);
        info!(chat_id, reminder_id = id, "reminder deleted");
        Ok(deleted)
    }

    /// Stop a reminder from firing again and keep it as Completed.
    pub fn complete_reminder(&self, chat_id: ChatId, id: ReminderId) -> Result<Reminder> {
        self.locks.with(id, || {
            let mut reminder = self.owned(chat_id, id)?;
            if reminder.status == ReminderStatus::Completed {
                return Ok(reminder);
            }
            if let Some(handle) = reminder.timer_handle {
                self.adapter.disarm(handle);
            }
            reminder.mark_completed(self.clock.now());
            self.store.update_reminder(&reminder)?;
            info!(chat_id, reminder_id = id, "reminder completed");
            Ok(reminder)
        })
    }

    /// Schedule a one-shot copy of the reminder's message.
    pub fn snooze(&self, chat_id: ChatId, id: ReminderId, target: SnoozeTarget) -> Result<Scheduled> {
        let original = self.owned(chat_id, id)?;
        let command = &original.payload.command;
        let message = &original.payload.message;
        match target {
            SnoozeTarget::In(offset) => self.add_in(chat_id, command, offset, message),
            SnoozeTarget::At(day) => self.add_on_relative_keyword(chat_id, command, &day, message),
        }
    }

    pub fn reminder_detail(&self, chat_id: ChatId, id: ReminderId) -> Result<Detail> {
        let reminder = self.owned(chat_id, id)?;
        let timezone = self.adapter.chat_timezone(chat_id)?;
        Ok(Detail { reminder, timezone })
    }

    pub fn list_reminders(&self, chat_id: ChatId) -> Result<ReminderList> {
        let mut reminders = self.store.list_by_chat(chat_id)?;
        reminders.sort_by_key(|r| r.id);

        let mut list = ReminderList::default();
        for r in reminders {
            match r.status {
                ReminderStatus::Active => list.active.push(r),
                ReminderStatus::Inactive => list.inactive.push(r),
                ReminderStatus::Completed => list.completed.push(r),
            }
        }
        Ok(list)
    }

    /// Delete every Completed reminder of the chat, returning how many went.
    pub fn remove_completed(&self, chat_id: ChatId) -> Result<usize> {
        let completed: Vec<ReminderId> = self
            .store
            .list_by_chat(chat_id)?
            .into_iter()
            .filter(|r| r.status == ReminderStatus::Completed)
            .map(|r| r.id)
            .collect();

        for id in &completed {
            self.locks.with(*id, || self.store.delete_reminder(chat_id, *id))?;
            self.locks.forget(*id);
        }
        info!(chat_id, removed = completed.len(), "completed reminders removed");
        Ok(completed.len())
    }
}

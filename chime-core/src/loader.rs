//! Rebuilding live registrations from the store, and chat timezone changes.

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::info;

use crate::error::Result;
use crate::locks::KeyedLocks;
use crate::reminder::{ChatId, Reminder};
use crate::store::{ChatPreference, ChatPreferenceStore, ReminderStore};
use crate::time::parse_timezone;
use crate::timer::SchedulerAdapter;

/// Zone given to chats that never set one.
pub const DEFAULT_TIMEZONE: &str = "Asia/Ho_Chi_Minh";

pub struct Rehydrator {
    store: Arc<dyn ReminderStore>,
    preferences: Arc<dyn ChatPreferenceStore>,
    adapter: Arc<SchedulerAdapter>,
    locks: Arc<KeyedLocks>,
}

impl Rehydrator {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        preferences: Arc<dyn ChatPreferenceStore>,
        adapter: Arc<SchedulerAdapter>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            store,
            preferences,
            adapter,
            locks,
        }
    }

    /// Arm every Active reminder of every chat, replacing any registration
    /// this process already holds for it. Returns how many were armed.
    pub fn rehydrate_all(&self) -> Result<usize> {
        let mut armed = 0;
        for (chat_id, reminders) in self.store.list_all_grouped_by_chat()? {
            let tz = self.adapter.chat_timezone(chat_id)?;
            for reminder in reminders.iter().filter(|r| r.is_active()) {
                self.rearm(reminder, tz)?;
                armed += 1;
            }
        }
        info!(armed, "reminders loaded");
        Ok(armed)
    }

    /// Replace every registration of one chat, evaluating the stored
    /// expressions in the chat's current zone.
    pub fn rehydrate_chat(&self, chat_id: ChatId) -> Result<usize> {
        let tz = self.adapter.chat_timezone(chat_id)?;
        let mut armed = 0;
        for reminder in self.store.list_by_chat(chat_id)? {
            if reminder.is_active() {
                self.rearm(&reminder, tz)?;
                armed += 1;
            } else {
                self.adapter.release(&reminder);
            }
        }
        info!(chat_id, timezone = %tz, armed, "chat reminders reloaded");
        Ok(armed)
    }

    fn rearm(&self, snapshot: &Reminder, tz: Tz) -> Result<()> {
        self.locks.with(snapshot.id, || {
            // Re-read under the lock; a fire may have moved it on since listing.
            let mut reminder = self.store.get_reminder(snapshot.chat_id, snapshot.id)?;
            self.adapter.release(&reminder);
            reminder.timer_handle = None;
            if !reminder.is_active() {
                return self.store.update_reminder(&reminder);
            }
            let armed = self.adapter.arm_in(&reminder, tz)?;
            armed.apply(&mut reminder);
            if let Err(e) = self.store.update_reminder(&reminder) {
                self.adapter.disarm(armed.handle);
                return Err(e);
            }
            Ok(())
        })
    }

    /// Create a preference with `default_zone` for each listed chat that has
    /// none. Returns how many were created.
    pub fn ensure_default_preferences(&self, chats: &[ChatId], default_zone: &str) -> Result<usize> {
        parse_timezone(default_zone)?;
        let mut created = 0;
        for &chat_id in chats {
            match self.preferences.get_preference(chat_id) {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    self.preferences.upsert_preference(&ChatPreference {
                        chat_id,
                        timezone: default_zone.to_string(),
                    })?;
                    created += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    pub fn get_timezone(&self, chat_id: ChatId) -> Result<Tz> {
        self.adapter.chat_timezone(chat_id)
    }

    /// Validate, store, then reload the chat's registrations in the new zone.
    /// An unknown zone writes nothing.
    pub fn set_timezone(&self, chat_id: ChatId, zone: &str) -> Result<Tz> {
        let tz = parse_timezone(zone)?;
        self.preferences.upsert_preference(&ChatPreference {
            chat_id,
            timezone: tz.name().to_string(),
        })?;
        self.rehydrate_chat(chat_id)?;
        Ok(tz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReminderError;
    use crate::reminder::{ReminderStatus, TimerHandle};
    use crate::schedule::RecurrenceExpr;
    use crate::store::MemoryStore;
    use crate::testing::{FixedClock, ManualTimer};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        timer: Arc<ManualTimer>,
        store: Arc<MemoryStore>,
        loader: Rehydrator,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::at(Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap()));
        let timer = Arc::new(ManualTimer::new(clock));
        let store = Arc::new(MemoryStore::new());
        let adapter = Arc::new(SchedulerAdapter::new(timer.clone(), store.clone()));
        let loader = Rehydrator::new(
            store.clone(),
            store.clone(),
            adapter,
            Arc::new(KeyedLocks::new()),
        );
        Fixture {
            timer,
            store,
            loader,
        }
    }

    fn stored(store: &MemoryStore, chat_id: ChatId, expr: &str, status: ReminderStatus) -> Reminder {
        let mut r = Reminder::new(
            chat_id,
            RecurrenceExpr::new(expr),
            "/remind me",
            "m",
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        )
        .recurring();
        r.status = status;
        // Left over from a previous process.
        r.timer_handle = Some(TimerHandle(500));
        r.id = store.create_reminder(&r).unwrap();
        r
    }

    #[test]
    fn full_rehydrate_arms_only_active() {
        let fx = fixture();
        fx.loader.ensure_default_preferences(&[1, 2], DEFAULT_TIMEZONE).unwrap();
        let a = stored(&fx.store, 1, "0 9 * * *", ReminderStatus::Active);
        stored(&fx.store, 1, "0 10 * * *", ReminderStatus::Completed);
        stored(&fx.store, 2, "30 7 * * 1-5", ReminderStatus::Active);
        stored(&fx.store, 2, "0 8 * * *", ReminderStatus::Inactive);

        assert_eq!(fx.loader.rehydrate_all().unwrap(), 2);
        assert_eq!(fx.timer.live_count(), 2);

        let after = fx.store.get_reminder(1, a.id).unwrap();
        let handle = after.timer_handle.unwrap();
        assert_ne!(handle, TimerHandle(500));
        assert_eq!(fx.timer.registration(handle).unwrap().expr, a.schedule);
        assert!(after.next_fire_at.is_some());
    }

    #[test]
    fn rehydrating_twice_replaces_rather_than_duplicates() {
        let fx = fixture();
        fx.loader.ensure_default_preferences(&[1], DEFAULT_TIMEZONE).unwrap();
        let a = stored(&fx.store, 1, "0 9 * * *", ReminderStatus::Active);
        stored(&fx.store, 1, "15 18 * * 0", ReminderStatus::Active);

        fx.loader.rehydrate_all().unwrap();
        let first = fx.store.get_reminder(1, a.id).unwrap();
        fx.loader.rehydrate_all().unwrap();
        let second = fx.store.get_reminder(1, a.id).unwrap();

        assert_eq!(fx.timer.live_count(), 2);
        assert!(fx.timer.was_disarmed(first.timer_handle.unwrap()));
        assert_eq!(first.schedule, second.schedule);
        assert_eq!(first.next_fire_at, second.next_fire_at);
    }

    #[test]
    fn missing_preference_fails_startup() {
        let fx = fixture();
        stored(&fx.store, 9, "0 9 * * *", ReminderStatus::Active);
        assert!(matches!(
            fx.loader.rehydrate_all(),
            Err(ReminderError::ChatNotFound { chat_id: 9 })
        ));
    }

    #[test]
    fn timezone_change_rearms_in_new_zone() {
        let fx = fixture();
        fx.loader.ensure_default_preferences(&[1], DEFAULT_TIMEZONE).unwrap();
        let a = stored(&fx.store, 1, "0 9 * * *", ReminderStatus::Active);
        fx.loader.rehydrate_all().unwrap();
        let before = fx.store.get_reminder(1, a.id).unwrap();

        let tz = fx.loader.set_timezone(1, "Europe/London").unwrap();
        assert_eq!(tz, chrono_tz::Europe::London);
        assert_eq!(fx.loader.get_timezone(1).unwrap(), tz);

        let after = fx.store.get_reminder(1, a.id).unwrap();
        assert!(fx.timer.was_disarmed(before.timer_handle.unwrap()));
        assert_eq!(after.schedule, before.schedule);
        // Ho Chi Minh is UTC+7, London is UTC+0 in January.
        let delta = after.next_fire_at.unwrap() - before.next_fire_at.unwrap();
        assert_eq!(delta, chrono::Duration::hours(7));
        assert_eq!(fx.timer.live_count(), 1);
    }

    #[test]
    fn unknown_zone_writes_nothing() {
        let fx = fixture();
        fx.loader.ensure_default_preferences(&[1], DEFAULT_TIMEZONE).unwrap();
        assert!(matches!(
            fx.loader.set_timezone(1, "Atlantis/Capital"),
            Err(ReminderError::TimezoneNotFound(_))
        ));
        assert_eq!(fx.store.get_preference(1).unwrap().timezone, DEFAULT_TIMEZONE);
    }

    #[test]
    fn defaults_only_fill_gaps() {
        let fx = fixture();
        fx.store
            .upsert_preference(&ChatPreference {
                chat_id: 1,
                timezone: "Europe/Rome".to_string(),
            })
            .unwrap();
        assert_eq!(
            fx.loader.ensure_default_preferences(&[1, 2], DEFAULT_TIMEZONE).unwrap(),
            1
        );
        assert_eq!(fx.store.get_preference(1).unwrap().timezone, "Europe/Rome");
        assert_eq!(fx.store.get_preference(2).unwrap().timezone, DEFAULT_TIMEZONE);
    }
}

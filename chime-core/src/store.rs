//! Repository contracts plus the in-memory state both bundled stores share.
//!
//! Reminder ids are unique across chats. `get_reminder` looks an id up
//! without checking ownership; the service decides whether the requesting
//! chat may see it.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ReminderError, Result};
use crate::reminder::{ChatId, Reminder, ReminderId};
use crate::time::parse_timezone;

pub trait ReminderStore: Send + Sync {
    /// Persist a new reminder, returning its assigned id.
    fn create_reminder(&self, reminder: &Reminder) -> Result<ReminderId>;
    fn update_reminder(&self, reminder: &Reminder) -> Result<()>;
    fn delete_reminder(&self, chat_id: ChatId, id: ReminderId) -> Result<()>;
    fn get_reminder(&self, chat_id: ChatId, id: ReminderId) -> Result<Reminder>;
    fn list_by_chat(&self, chat_id: ChatId) -> Result<Vec<Reminder>>;
    fn list_all_grouped_by_chat(&self) -> Result<BTreeMap<ChatId, Vec<Reminder>>>;
}

/// Per-chat timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPreference {
    pub chat_id: ChatId,
    /// IANA zone name.
    pub timezone: String,
}

impl ChatPreference {
    pub fn tz(&self) -> Result<Tz> {
        parse_timezone(&self.timezone)
    }
}

pub trait ChatPreferenceStore: Send + Sync {
    fn get_preference(&self, chat_id: ChatId) -> Result<ChatPreference>;
    fn upsert_preference(&self, preference: &ChatPreference) -> Result<()>;
}

/// Serializable store contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub last_id: ReminderId,
    #[serde(default)]
    pub reminders: BTreeMap<ReminderId, Reminder>,
    #[serde(default)]
    pub preferences: BTreeMap<ChatId, ChatPreference>,
}

impl StoreState {
    pub fn create_reminder(&mut self, reminder: &Reminder) -> ReminderId {
        self.last_id += 1;
        let mut stored = reminder.clone();
        stored.id = self.last_id;
        self.reminders.insert(stored.id, stored);
        self.last_id
    }

    pub fn update_reminder(&mut self, reminder: &Reminder) -> Result<()> {
        match self.reminders.get_mut(&reminder.id) {
            Some(slot) if slot.chat_id == reminder.chat_id => {
                *slot = reminder.clone();
                Ok(())
            }
            _ => Err(ReminderError::ReminderNotFound {
                chat_id: reminder.chat_id,
                reminder_id: reminder.id,
            }),
        }
    }

    pub fn delete_reminder(&mut self, chat_id: ChatId, id: ReminderId) -> Result<()> {
        match self.reminders.get(&id) {
            Some(r) if r.chat_id == chat_id => {
                self.reminders.remove(&id);
                Ok(())
            }
            _ => Err(ReminderError::ReminderNotFound {
                chat_id,
                reminder_id: id,
            }),
        }
    }

    pub fn get_reminder(&self, chat_id: ChatId, id: ReminderId) -> Result<Reminder> {
        self.reminders
            .get(&id)
            .cloned()
            .ok_or(ReminderError::ReminderNotFound {
                chat_id,
                reminder_id: id,
            })
    }

    pub fn list_by_chat(&self, chat_id: ChatId) -> Vec<Reminder> {
        self.reminders
            .values()
            .filter(|r| r.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub fn list_all_grouped_by_chat(&self) -> BTreeMap<ChatId, Vec<Reminder>> {
        let mut out: BTreeMap<ChatId, Vec<Reminder>> = BTreeMap::new();
        for r in self.reminders.values() {
            out.entry(r.chat_id).or_default().push(r.clone());
        }
        out
    }

    pub fn get_preference(&self, chat_id: ChatId) -> Result<ChatPreference> {
        self.preferences
            .get(&chat_id)
            .cloned()
            .ok_or(ReminderError::ChatNotFound { chat_id })
    }

    pub fn upsert_preference(&mut self, preference: &ChatPreference) {
        self.preferences
            .insert(preference.chat_id, preference.clone());
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn snapshot(&self) -> Result<StoreState> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| ReminderError::persistence("memory store lock poisoned"))
    }
}

impl ReminderStore for MemoryStore {
    fn create_reminder(&self, reminder: &Reminder) -> Result<ReminderId> {
        Ok(self.lock()?.create_reminder(reminder))
    }

    fn update_reminder(&self, reminder: &Reminder) -> Result<()> {
        self.lock()?.update_reminder(reminder)
    }

    fn delete_reminder(&self, chat_id: ChatId, id: ReminderId) -> Result<()> {
        self.lock()?.delete_reminder(chat_id, id)
    }

    fn get_reminder(&self, chat_id: ChatId, id: ReminderId) -> Result<Reminder> {
        self.lock()?.get_reminder(chat_id, id)
    }

    fn list_by_chat(&self, chat_id: ChatId) -> Result<Vec<Reminder>> {
        Ok(self.lock()?.list_by_chat(chat_id))
    }

    fn list_all_grouped_by_chat(&self) -> Result<BTreeMap<ChatId, Vec<Reminder>>> {
        Ok(self.lock()?.list_all_grouped_by_chat())
    }
}

impl ChatPreferenceStore for MemoryStore {
    fn get_preference(&self, chat_id: ChatId) -> Result<ChatPreference> {
        self.lock()?.get_preference(chat_id)
    }

    fn upsert_preference(&self, preference: &ChatPreference) -> Result<()> {
        self.lock()?.upsert_preference(preference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::RecurrenceExpr;
    use chrono::{TimeZone, Utc};

    fn reminder(chat_id: ChatId, message: &str) -> Reminder {
        Reminder::new(
            chat_id,
            RecurrenceExpr::new("0 9 * * *"),
            format!("/remind me every day {message}"),
            message,
            Utc.with_ymd_and_hms(2026, 2, 21, 8, 25, 0).unwrap(),
        )
    }

    #[test]
    fn ids_are_assigned_sequentially_across_chats() {
        let store = MemoryStore::new();
        let a = store.create_reminder(&reminder(1, "a")).unwrap();
        let b = store.create_reminder(&reminder(2, "b")).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.get_reminder(2, b).unwrap().id, b);
    }

    #[test]
    fn update_and_delete_require_the_owning_chat() {
        let store = MemoryStore::new();
        let id = store.create_reminder(&reminder(1, "a")).unwrap();

        let mut r = store.get_reminder(1, id).unwrap();
        r.chat_id = 2;
        assert!(store.update_reminder(&r).unwrap_err().is_not_found());
        assert!(store.delete_reminder(2, id).unwrap_err().is_not_found());

        store.delete_reminder(1, id).unwrap();
        assert!(store.get_reminder(1, id).is_err());
    }

    #[test]
    fn grouping_partitions_by_chat() {
        let store = MemoryStore::new();
        store.create_reminder(&reminder(1, "a")).unwrap();
        store.create_reminder(&reminder(2, "b")).unwrap();
        store.create_reminder(&reminder(1, "c")).unwrap();

        let grouped = store.list_all_grouped_by_chat().unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&1].len(), 2);
        assert_eq!(store.list_by_chat(2).unwrap()[0].payload.message, "b");
    }

    #[test]
    fn preferences_upsert_and_validate_zone() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_preference(5),
            Err(ReminderError::ChatNotFound { chat_id: 5 })
        ));

        store
            .upsert_preference(&ChatPreference {
                chat_id: 5,
                timezone: "Europe/Rome".to_string(),
            })
            .unwrap();
        let pref = store.get_preference(5).unwrap();
        assert_eq!(pref.tz().unwrap(), chrono_tz::Europe::Rome);
    }

    #[test]
    fn state_round_trips_through_json() {
        let store = MemoryStore::new();
        store.create_reminder(&reminder(-100, "group chat")).unwrap();
        store
            .upsert_preference(&ChatPreference {
                chat_id: -100,
                timezone: "Asia/Ho_Chi_Minh".to_string(),
            })
            .unwrap();

        let state = store.snapshot().unwrap();
        let json = serde_json::to_string(&state).unwrap();
        let back: StoreState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}

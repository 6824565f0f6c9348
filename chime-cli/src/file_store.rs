//! JSON file persistence for reminders and chat preferences.
//!
//! The whole store is one document. Every mutation is applied to a copy,
//! written to a sibling temp file and renamed over the original; the
//! in-memory state only changes once the rename succeeded.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chime_core::{
    ChatId, ChatPreference, ChatPreferenceStore, Reminder, ReminderError, ReminderId,
    ReminderStore, Result, StoreState,
};
use tracing::debug;

pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open `path`, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = Self::read_state(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Parse the document at `path` without keeping it open for writes.
    pub fn read_state(path: &Path) -> Result<StoreState> {
        if !path.exists() {
            return Ok(StoreState::default());
        }
        let s = fs::read_to_string(path)
            .map_err(|e| ReminderError::persistence(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&s)
            .map_err(|e| ReminderError::persistence(format!("parse {}: {e}", path.display())))
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| ReminderError::persistence("file store lock poisoned"))
    }

    fn mutate<T>(&self, op: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut state = self.lock()?;
        let mut next = state.clone();
        let out = op(&mut next)?;
        write_atomic(&self.path, &next)?;
        *state = next;
        Ok(out)
    }
}

fn write_atomic(path: &Path, state: &StoreState) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| ReminderError::persistence(format!("create {}: {e}", dir.display())))?;
    }
    let json = serde_json::to_string_pretty(state).map_err(ReminderError::persistence)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .map_err(|e| ReminderError::persistence(format!("write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| ReminderError::persistence(format!("rename to {}: {e}", path.display())))?;
    debug!(path = %path.display(), reminders = state.reminders.len(), "store written");
    Ok(())
}

impl ReminderStore for JsonFileStore {
    fn create_reminder(&self, reminder: &Reminder) -> Result<ReminderId> {
        self.mutate(|s| Ok(s.create_reminder(reminder)))
    }

    fn update_reminder(&self, reminder: &Reminder) -> Result<()> {
        self.mutate(|s| s.update_reminder(reminder))
    }

    fn delete_reminder(&self, chat_id: ChatId, id: ReminderId) -> Result<()> {
        self.mutate(|s| s.delete_reminder(chat_id, id))
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

impl ChatPreferenceStore for JsonFileStore {
    fn get_preference(&self, chat_id: ChatId) -> Result<ChatPreference> {
        self.lock()?.get_preference(chat_id)
    }

    fn upsert_preference(&self, preference: &ChatPreference) -> Result<()> {
        self.mutate(|s| {
            s.upsert_preference(preference);
            Ok(())
        })
    }
}

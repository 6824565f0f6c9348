//! chime-core: reminder scheduling engine.
//!
//! Turns time specs into recurrence expressions, arms them on a timer
//! primitive in the owning chat's timezone, and drives each reminder through
//! its fire/reschedule/complete lifecycle. Storage, the timer and the chat
//! transport are collaborators behind traits.

pub mod clock;
pub mod error;
pub mod fire;
pub mod loader;
pub mod locks;
pub mod notify;
pub mod reminder;
pub mod schedule;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod time;
pub mod timer;

pub use clock::{Clock, SystemClock};
pub use error::{ReminderError, Result};
pub use fire::{FireHandler, FireOutcome};
pub use loader::{DEFAULT_TIMEZONE, Rehydrator};
pub use locks::KeyedLocks;
pub use notify::{Control, Notifier, controls_for, notification_text};
pub use reminder::{ChatId, Payload, Reminder, ReminderId, ReminderStatus, RepeatOffset, TimerHandle};
pub use schedule::RecurrenceExpr;
pub use service::{Detail, ReminderList, ReminderService, Scheduled, SnoozeTarget, format_local};
pub use store::{ChatPreference, ChatPreferenceStore, MemoryStore, ReminderStore, StoreState};
pub use time::{
    CalendarFields, DayKeyword, Normalized, RecurringFields, RelativeDay, TimeSpec, convert_to_24h,
    normalize, parse_timezone,
};
pub use timer::{Armed, FireEvent, FireTarget, SchedulerAdapter, TimerPrimitive};

use std::sync::Arc;

/// The wired engine. Built once by the composition root.
pub struct Engine {
    pub service: ReminderService,
    pub loader: Rehydrator,
    pub fire: Arc<FireHandler>,
}

impl Engine {
    pub fn new<S>(
        store: Arc<S>,
        timer: Arc<dyn TimerPrimitive>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        S: ReminderStore + ChatPreferenceStore + 'static,
    {
        let locks = Arc::new(KeyedLocks::new());
        let adapter = Arc::new(SchedulerAdapter::new(timer, store.clone()));
        let service = ReminderService::new(
            store.clone(),
            adapter.clone(),
            clock.clone(),
            locks.clone(),
        );
        let loader = Rehydrator::new(store.clone(), store.clone(), adapter.clone(), locks.clone());
        let fire = Arc::new(FireHandler::new(store, adapter, notifier, clock, locks));
        Self {
            service,
            loader,
            fire,
        }
    }
}

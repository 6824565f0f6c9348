//! In-process doubles for the engine's collaborators.
//!
//! Shared by the unit tests and, behind the `testing` feature, by
//! integration tests here and in dependent crates. `ManualTimer`
//! evaluates expressions with the same evaluator a real primitive would use,
//! but only fires when asked via [`ManualTimer::due`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::clock::Clock;
use crate::error::{ReminderError, Result};
use crate::notify::{Control, Notifier};
use crate::reminder::{ChatId, TimerHandle};
use crate::schedule::{self, RecurrenceExpr};
use crate::timer::{FireEvent, FireTarget, TimerPrimitive};

/// Settable clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live registration on the manual timer.
#[derive(Debug, Clone)]
pub struct Registration {
    pub expr: RecurrenceExpr,
    pub timezone: Tz,
    pub target: FireTarget,
    pub next: Option<DateTime<Utc>>,
    schedule: cron::Schedule,
}

#[derive(Debug, Default)]
struct ManualState {
    last_handle: u64,
    live: BTreeMap<TimerHandle, Registration>,
    disarmed: Vec<TimerHandle>,
}

pub struct ManualTimer {
    clock: Arc<dyn Clock>,
    state: Mutex<ManualState>,
}

impl ManualTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(ManualState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn registration(&self, handle: TimerHandle) -> Option<Registration> {
        self.lock().live.get(&handle).cloned()
    }

    pub fn live(&self) -> Vec<(TimerHandle, Registration)> {
        self.lock()
            .live
            .iter()
            .map(|(h, r)| (*h, r.clone()))
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    pub fn was_disarmed(&self, handle: TimerHandle) -> bool {
        self.lock().disarmed.contains(&handle)
    }

    /// Every registration due at or before `at`, in fire order. Each one is
    /// advanced to its following occurrence, as a cron primitive would.
    pub fn due(&self, at: DateTime<Utc>) -> Vec<FireEvent> {
        let mut state = self.lock();
        let mut fired: Vec<(DateTime<Utc>, FireEvent)> = Vec::new();
        for (handle, reg) in state.live.iter_mut() {
            if let Some(next) = reg.next.filter(|next| *next <= at) {
                fired.push((
                    next,
                    FireEvent {
                        target: reg.target,
                        handle: *handle,
                    },
                ));
                reg.next = schedule::next_after(&reg.schedule, reg.timezone, at);
            }
        }
        fired.sort_by_key(|(next, event)| (*next, event.handle));
        fired.into_iter().map(|(_, event)| event).collect()
    }
}

impl TimerPrimitive for ManualTimer {
    fn arm(&self, expr: &RecurrenceExpr, tz: Tz, target: FireTarget) -> Result<TimerHandle> {
        let compiled = schedule::compile(expr)?;
        let next = schedule::next_after(&compiled, tz, self.clock.now());
        let mut state = self.lock();
        state.last_handle += 1;
        let handle = TimerHandle(state.last_handle);
        state.live.insert(
            handle,
            Registration {
                expr: expr.clone(),
                timezone: tz,
                target,
                next,
                schedule: compiled,
            },
        );
        Ok(handle)
    }

    fn disarm(&self, handle: TimerHandle) {
        let mut state = self.lock();
        if state.live.remove(&handle).is_some() {
            state.disarmed.push(handle);
        }
    }

    fn next_fire(&self, handle: TimerHandle) -> Option<DateTime<Utc>> {
        self.lock().live.get(&handle).and_then(|r| r.next)
    }

    fn target(&self, handle: TimerHandle) -> Option<FireTarget> {
        self.lock().live.get(&handle).map(|r| r.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub recipient: ChatId,
    pub text: String,
    pub controls: Vec<Control>,
}

/// Notifier that records what it was asked to send. Can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, recipient: ChatId, text: &str, controls: &[Control]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReminderError::Delivery("transport offline".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Sent {
                recipient,
                text: text.to_string(),
                controls: controls.to_vec(),
            });
        Ok(())
    }
}

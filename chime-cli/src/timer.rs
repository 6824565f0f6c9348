//! Wall-clock timer primitive on the tokio runtime.
//!
//! Each registration is one task that sleeps until the next occurrence of
//! its expression, emits a [`FireEvent`] and computes the following one.
//! Disarming aborts the task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chime_core::schedule::{self, RecurrenceExpr};
use chime_core::{FireEvent, FireTarget, Result, TimerHandle, TimerPrimitive};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Entry {
    target: FireTarget,
    next: Option<DateTime<Utc>>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    last_handle: u64,
    live: HashMap<TimerHandle, Entry>,
}

type Shared = Arc<Mutex<Registry>>;

fn lock(registry: &Shared) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct TokioTimer {
    runtime: Handle,
    events: UnboundedSender<FireEvent>,
    registry: Shared,
}

impl TokioTimer {
    /// Must be called from inside a tokio runtime. Registrations are spawned
    /// on it even when `arm` is later called from a blocking thread.
    pub fn new(events: UnboundedSender<FireEvent>) -> Self {
        Self {
            runtime: Handle::current(),
            events,
            registry: Shared::default(),
        }
    }

    pub fn live_count(&self) -> usize {
        lock(&self.registry).live.len()
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for (_, entry) in lock(&self.registry).live.drain() {
            entry.task.abort();
        }
    }
}

impl TimerPrimitive for TokioTimer {
    fn arm(&self, expr: &RecurrenceExpr, tz: Tz, target: FireTarget) -> Result<TimerHandle> {
        let compiled = schedule::compile(expr)?;
        let first = schedule::next_after(&compiled, tz, Utc::now());

        let mut registry = lock(&self.registry);
        registry.last_handle += 1;
        let handle = TimerHandle(registry.last_handle);

        let task = self.runtime.spawn(run_registration(
            handle,
            target,
            compiled,
            tz,
            first,
            self.events.clone(),
            self.registry.clone(),
        ));
        registry.live.insert(
            handle,
            Entry {
                target,
                next: first,
                task,
            },
        );
        Ok(handle)
    }

    fn disarm(&self, handle: TimerHandle) {
        if let Some(entry) = lock(&self.registry).live.remove(&handle) {
            entry.task.abort();
            debug!(handle = handle.0, reminder_id = entry.target.reminder_id, "disarmed");
        }
    }

    fn next_fire(&self, handle: TimerHandle) -> Option<DateTime<Utc>> {
        lock(&self.registry).live.get(&handle).and_then(|e| e.next)
    }

    fn target(&self, handle: TimerHandle) -> Option<FireTarget> {
        lock(&self.registry).live.get(&handle).map(|e| e.target)
    }
}

async fn run_registration(
    handle: TimerHandle,
    target: FireTarget,
    compiled: cron::Schedule,
    tz: Tz,
    mut next: Option<DateTime<Utc>>,
    events: UnboundedSender<FireEvent>,
    registry: Shared,
) {
    while let Some(at) = next {
        let wait = (at - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        // Advance before emitting: the handler reads next_fire for this handle.
        next = schedule::next_after(&compiled, tz, at);
        if let Some(entry) = lock(&registry).live.get_mut(&handle) {
            entry.next = next;
        }
        if events.send(FireEvent { target, handle }).is_err() {
            warn!(handle = handle.0, "fire receiver closed; stopping registration");
            break;
        }
    }
}

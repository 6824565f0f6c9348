use std::sync::Arc;

use chime_core::testing::{FixedClock, ManualTimer, RecordingNotifier};
use chime_core::{
    ChatPreference, ChatPreferenceStore, Control, Engine, FireOutcome, MemoryStore,
    RecurringFields, ReminderStatus, ReminderStore, RepeatOffset,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

const CHAT: i64 = 42;

struct Harness {
    clock: Arc<FixedClock>,
    timer: Arc<ManualTimer>,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    engine: Engine,
}

fn harness(now: DateTime<Utc>, zone: &str) -> Harness {
    let clock = Arc::new(FixedClock::at(now));
    let timer = Arc::new(ManualTimer::new(clock.clone()));
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_preference(&ChatPreference {
            chat_id: CHAT,
            timezone: zone.to_string(),
        })
        .unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Engine::new(store.clone(), timer.clone(), notifier.clone(), clock.clone());
    Harness {
        clock,
        timer,
        store,
        notifier,
        engine,
    }
}

impl Harness {
    /// Move the clock to `at` and deliver whatever is due.
    fn run_until(&self, at: DateTime<Utc>) -> Vec<FireOutcome> {
        self.clock.set(at);
        self.timer
            .due(at)
            .into_iter()
            .map(|event| self.engine.fire.handle(event))
            .collect()
    }
}

#[test]
fn every_two_minutes_keeps_rescheduling() {
    let t0 = Utc.with_ymd_and_hms(2020, 4, 1, 6, 45, 0).unwrap();
    let h = harness(t0, "Asia/Ho_Chi_Minh");

    let scheduled = h
        .engine
        .service
        .add_every(CHAT, "/remind me every 2 minutes drink", RepeatOffset::minutes(2), "drink")
        .unwrap();
    let id = scheduled.reminder.id;
    let first_handle = scheduled.reminder.timer_handle.unwrap();
    // 13:47 local.
    assert_eq!(scheduled.reminder.schedule.as_str(), "47 13 1 4 *");
    assert_eq!(scheduled.at, t0 + Duration::minutes(2));

    let outcomes = h.run_until(t0 + Duration::minutes(2));
    assert_eq!(outcomes, vec![FireOutcome::Rescheduled]);

    let r = h.store.get_reminder(CHAT, id).unwrap();
    assert_eq!(r.status, ReminderStatus::Active);
    assert_eq!(r.schedule.as_str(), "49 13 1 4 *");
    assert_eq!(r.next_fire_at, Some(t0 + Duration::minutes(4)));
    assert_eq!(r.last_fired_at, Some(t0 + Duration::minutes(2)));
    assert!(h.timer.was_disarmed(first_handle));
    assert_eq!(h.timer.live_count(), 1);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, CHAT);
    assert_eq!(sent[0].text, "🗓 drink");
    assert_eq!(sent[0].controls, vec![Control::Snooze(id), Control::Complete(id)]);

    // Keeps going until completed by hand.
    assert_eq!(
        h.run_until(t0 + Duration::minutes(4)),
        vec![FireOutcome::Rescheduled]
    );
    h.engine.service.complete_reminder(CHAT, id).unwrap();
    assert!(h.run_until(t0 + Duration::minutes(6)).is_empty());
    assert_eq!(h.timer.live_count(), 0);
}

#[test]
fn one_shot_fires_once_then_completes() {
    let t0 = Utc.with_ymd_and_hms(2020, 4, 1, 6, 45, 0).unwrap();
    let h = harness(t0, "Asia/Ho_Chi_Minh");

    let scheduled = h
        .engine
        .service
        .add_in(CHAT, "/remind me in 5 minutes tea", RepeatOffset::minutes(5), "tea")
        .unwrap();

    assert_eq!(
        h.run_until(t0 + Duration::minutes(5)),
        vec![FireOutcome::Completed]
    );
    let r = h.store.get_reminder(CHAT, scheduled.reminder.id).unwrap();
    assert_eq!(r.status, ReminderStatus::Completed);
    assert!(r.completed_at.is_some());
    assert!(r.timer_handle.is_none());
    assert_eq!(h.notifier.sent()[0].controls, vec![Control::Snooze(r.id)]);

    // A year later the pinned expression would match again, but nothing is armed.
    assert!(h.run_until(t0 + Duration::days(366)).is_empty());
}

#[test]
fn timezone_change_moves_every_registration() {
    // January: Ho Chi Minh is UTC+7, London UTC+0.
    let t0 = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
    let h = harness(t0, "Asia/Ho_Chi_Minh");

    let daily = RecurringFields {
        minute: "0".into(),
        hour: "9".into(),
        ..RecurringFields::default()
    };
    let weekly = RecurringFields {
        minute: "30".into(),
        hour: "18".into(),
        day_of_week: "3".into(),
        ..RecurringFields::default()
    };
    let a = h
        .engine
        .service
        .add_on_recurring_fields(CHAT, "/remind me every day at 9 a", &daily, "a")
        .unwrap();
    let b = h
        .engine
        .service
        .add_on_recurring_fields(CHAT, "/remind me every wednesday at 18:30 b", &weekly, "b")
        .unwrap();

    assert_eq!(h.engine.loader.set_timezone(CHAT, "Europe/London").unwrap().name(), "Europe/London");

    for before in [a.reminder, b.reminder] {
        let after = h.store.get_reminder(CHAT, before.id).unwrap();
        assert!(h.timer.was_disarmed(before.timer_handle.unwrap()));
        assert_ne!(after.timer_handle, before.timer_handle);
        assert_eq!(after.schedule, before.schedule);
        assert_eq!(
            after.next_fire_at.unwrap() - before.next_fire_at.unwrap(),
            Duration::hours(7)
        );
        let reg = h.timer.registration(after.timer_handle.unwrap()).unwrap();
        assert_eq!(reg.timezone, chrono_tz::Europe::London);
    }
    assert_eq!(h.timer.live_count(), 2);
}

#[test]
fn restart_rehydrates_from_persisted_state() {
    let t0 = Utc.with_ymd_and_hms(2020, 4, 1, 6, 45, 0).unwrap();
    let h = harness(t0, "Asia/Ho_Chi_Minh");
    let kept = h
        .engine
        .service
        .add_in(CHAT, "/remind me in 1 hour stretch", RepeatOffset { hours: 1, ..RepeatOffset::default() }, "stretch")
        .unwrap();
    let done = h
        .engine
        .service
        .add_in(CHAT, "/remind me in 2 hours nap", RepeatOffset { hours: 2, ..RepeatOffset::default() }, "nap")
        .unwrap();
    h.engine.service.complete_reminder(CHAT, done.reminder.id).unwrap();

    // New process: same persisted state, fresh timer.
    let state = h.store.snapshot().unwrap();
    let clock = Arc::new(FixedClock::at(t0 + Duration::minutes(10)));
    let timer = Arc::new(ManualTimer::new(clock.clone()));
    let store = Arc::new(MemoryStore::with_state(state));
    let engine = Engine::new(
        store.clone(),
        timer.clone(),
        Arc::new(RecordingNotifier::new()),
        clock,
    );

    assert_eq!(engine.loader.rehydrate_all().unwrap(), 1);
    assert_eq!(engine.loader.rehydrate_all().unwrap(), 1);
    assert_eq!(timer.live_count(), 1);

    let (_, reg) = timer.live().remove(0);
    assert_eq!(reg.target.reminder_id, kept.reminder.id);
    assert_eq!(reg.expr, kept.reminder.schedule);
    assert_eq!(reg.next, Some(kept.at));
    assert_eq!(
        store.get_reminder(CHAT, kept.reminder.id).unwrap().next_fire_at,
        Some(kept.at)
    );
}

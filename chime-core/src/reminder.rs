//! Reminder entity: one notification obligation and its persisted state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::RecurrenceExpr;

pub type ChatId = i64;
pub type ReminderId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReminderStatus {
    Active,
    Inactive,
    Completed,
}

/// Opaque reference to a live registration on the timer primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerHandle(pub u64);

/// "Every N units" duration, re-applied to chat-local now on each cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatOffset {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl RepeatOffset {
    pub fn minutes(minutes: u32) -> Self {
        Self {
            minutes,
            ..Self::default()
        }
    }

    /// Absolute duration: a day is 24 hours regardless of DST.
    pub fn duration(&self) -> Duration {
        Duration::days(self.days.into())
            + Duration::hours(self.hours.into())
            + Duration::minutes(self.minutes.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub recipient_id: ChatId,
    /// The command text the reminder was created from.
    pub command: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// Assigned by the store on create; 0 until then.
    pub id: ReminderId,
    pub chat_id: ChatId,
    pub schedule: RecurrenceExpr,
    /// Tear the registration down after one fire.
    pub run_once: bool,
    /// Only ever set together with `run_once`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_offset: Option<RepeatOffset>,
    pub status: ReminderStatus,
    #[serde(default)]
    pub timer_handle: Option<TimerHandle>,
    #[serde(default)]
    pub next_fire_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_fired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub payload: Payload,
}

impl Reminder {
    /// New Active reminder addressed to its own chat.
    pub fn new(
        chat_id: ChatId,
        schedule: RecurrenceExpr,
        command: impl Into<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            chat_id,
            schedule,
            run_once: true,
            repeat_offset: None,
            status: ReminderStatus::Active,
            timer_handle: None,
            next_fire_at: None,
            last_fired_at: None,
            completed_at: None,
            created_at,
            payload: Payload {
                recipient_id: chat_id,
                command: command.into(),
                message: message.into(),
            },
        }
    }

    pub fn recurring(mut self) -> Self {
        self.run_once = false;
        self.repeat_offset = None;
        self
    }

    pub fn repeating_every(mut self, offset: RepeatOffset) -> Self {
        self.run_once = true;
        self.repeat_offset = Some(offset);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ReminderStatus::Active
    }

    /// A genuine one-shot: fires once and completes.
    pub fn is_one_shot(&self) -> bool {
        self.run_once && self.repeat_offset.is_none()
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.status = ReminderStatus::Completed;
        self.completed_at = Some(at);
        self.timer_handle = None;
        self.next_fire_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Reminder {
        Reminder::new(
            42,
            RecurrenceExpr::new("0 9 * * *"),
            "/remind me every day water plants",
            "water plants",
            Utc.with_ymd_and_hms(2020, 4, 1, 6, 45, 0).unwrap(),
        )
    }

    #[test]
    fn builders_keep_offset_and_run_once_consistent() {
        let r = sample().repeating_every(RepeatOffset::minutes(2));
        assert!(r.run_once);
        assert_eq!(r.repeat_offset, Some(RepeatOffset::minutes(2)));
        assert!(!r.is_one_shot());

        let r = r.recurring();
        assert!(!r.run_once);
        assert!(r.repeat_offset.is_none());
    }

    #[test]
    fn offset_duration_sums_units() {
        let off = RepeatOffset {
            days: 3,
            hours: 2,
            minutes: 1,
        };
        assert_eq!(off.duration(), Duration::minutes(3 * 24 * 60 + 2 * 60 + 1));
    }

    #[test]
    fn completing_clears_the_live_registration() {
        let mut r = sample();
        r.timer_handle = Some(TimerHandle(9));
        let at = Utc.with_ymd_and_hms(2020, 4, 2, 2, 0, 0).unwrap();
        r.mark_completed(at);
        assert_eq!(r.status, ReminderStatus::Completed);
        assert_eq!(r.completed_at, Some(at));
        assert!(r.timer_handle.is_none());
    }

    #[test]
    fn persisted_layout_carries_full_entity() {
        let r = sample().repeating_every(RepeatOffset::minutes(5));
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"schedule\":\"0 9 * * *\""));
        assert!(json.contains("\"status\":\"Active\""));
        assert!(json.contains("\"repeat_offset\":{\"days\":0,\"hours\":0,\"minutes\":5}"));

        let back: Reminder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}

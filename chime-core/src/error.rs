//! Error taxonomy for the reminder engine.

use crate::reminder::{ChatId, ReminderId};

/// Errors surfaced by the service, loader and adapter layers.
///
/// None of these are retried internally. The fire handler is the only place
/// they are swallowed (logged) instead of returned.
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    /// The chat has no usable IANA zone.
    #[error("unknown timezone: {0}")]
    TimezoneNotFound(String),

    /// A candidate instant failed the "at least 2 minutes ahead" rule.
    #[error("time must be at least 2 minutes in the future")]
    TimeInPast,

    /// Hour/minute that do not form a wall-clock time (e.g. "13pm").
    #[error("invalid time of day {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    /// The timer primitive rejected the recurrence expression.
    #[error("scheduler rejected '{expression}': {reason}")]
    SchedulerArm {
        /// The expression that was handed to the primitive.
        expression: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Store read or write failure.
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("reminder {reminder_id} not found for chat {chat_id}")]
    ReminderNotFound {
        chat_id: ChatId,
        reminder_id: ReminderId,
    },

    #[error("no preferences stored for chat {chat_id}")]
    ChatNotFound { chat_id: ChatId },

    /// The requesting chat does not own the reminder.
    #[error("chat {chat_id} is not allowed to access reminder {reminder_id}")]
    Unauthorized {
        chat_id: ChatId,
        reminder_id: ReminderId,
    },

    /// The transport could not deliver a notification.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl ReminderError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ReminderNotFound { .. } | Self::ChatNotFound { .. }
        )
    }
}

/// Convenient alias for `Result`.
pub type Result<T, E = ReminderError> = std::result::Result<T, E>;

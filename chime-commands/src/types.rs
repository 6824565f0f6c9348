use chime_core::{CalendarFields, RecurringFields, RelativeDay, ReminderId, RepeatOffset, SnoozeTarget};

/// When a "/remind me ..." reminder should fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum When {
    /// "in 5 minutes": once, after the offset.
    In(RepeatOffset),
    /// "every 2 hours": after the offset, then again and again.
    Every(RepeatOffset),
    /// "on the 1st of december", "on tuesday": once, next matching date.
    On(CalendarFields),
    /// "tomorrow morning", "at 21:00".
    Relative(RelativeDay),
    /// "every tuesday", "every 1st of the month".
    Recurring(RecurringFields),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Remind { when: When, message: String },
    List,
    Detail(ReminderId),
    Delete(ReminderId),
    Complete(ReminderId),
    Snooze { id: ReminderId, target: SnoozeTarget },
    RemoveCompleted,
    GetTimezone,
    SetTimezone(String),
    Help,
}

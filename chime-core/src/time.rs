//! Time-spec normalization: timezone-aware conversion of the four accepted
//! input shapes into either a concrete instant or a recurrence expression.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{ReminderError, Result};
use crate::reminder::RepeatOffset;
use crate::schedule::RecurrenceExpr;

/// Candidates must be at least this far ahead of "now".
pub const MIN_LEAD_MINUTES: i64 = 2;

/// Parse an IANA zone name like "America/Chicago".
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ReminderError::TimezoneNotFound(name.to_string()))
}

/// 12-hour clock to 24-hour clock. `meridiem` is "am", "pm" or empty.
pub fn convert_to_24h(hour: u32, minute: u32, meridiem: &str) -> (u32, u32) {
    match (meridiem, hour) {
        // midnight
        ("am", 12) => (0, minute),
        // noon
        ("pm", 12) => (12, minute),
        ("pm", h) => (h + 12, minute),
        _ => (hour, minute),
    }
}

/// Absolute calendar fields ("on the 1st of december at 8:23", "on tuesday").
/// Unset fields become wildcards; hour/minute are always concrete. When both
/// `day_of_month` and `day_of_week` are set, a day must match both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarFields {
    pub day_of_month: Option<u32>,
    pub month: Option<u32>,
    pub day_of_week: Option<String>,
    pub hour: u32,
    pub minute: u32,
}

impl CalendarFields {
    pub fn expression(&self) -> RecurrenceExpr {
        let num = |v: Option<u32>| v.map(|v| v.to_string()).unwrap_or_default();
        RecurrenceExpr::from_fields(
            &self.minute.to_string(),
            &self.hour.to_string(),
            &num(self.day_of_month),
            &num(self.month),
            self.day_of_week.as_deref().unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKeyword {
    Today,
    Tomorrow,
}

/// "today at 21:00", "tomorrow morning".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeDay {
    pub when: DayKeyword,
    pub hour: u32,
    pub minute: u32,
}

/// Recurring calendar fields, already tokenized (digits, lists, ranges).
/// Empty tokens mean wildcard; the tokens are not range-checked here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecurringFields {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month: String,
    pub day_of_week: String,
}

impl RecurringFields {
    pub fn expression(&self) -> RecurrenceExpr {
        RecurrenceExpr::from_fields(
            &self.minute,
            &self.hour,
            &self.day_of_month,
            &self.month,
            &self.day_of_week,
        )
    }
}

/// The four accepted time-spec shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSpec {
    Absolute(CalendarFields),
    Relative(RelativeDay),
    Recurring(RecurringFields),
    Offset(RepeatOffset),
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// A concrete chat-local instant.
    At(DateTime<Tz>),
    /// A calendar pattern evaluated by the timer primitive.
    Pattern(RecurrenceExpr),
}

impl Normalized {
    /// Instants are pinned to their exact minute/hour/day/month.
    pub fn expression(&self) -> RecurrenceExpr {
        match self {
            Normalized::At(at) => RecurrenceExpr::pinned(at),
            Normalized::Pattern(expr) => expr.clone(),
        }
    }
}

/// Normalize a time spec against the chat zone and the evaluation instant.
pub fn normalize(spec: &TimeSpec, tz: Tz, now: DateTime<Utc>) -> Result<Normalized> {
    match spec {
        TimeSpec::Absolute(fields) => Ok(Normalized::Pattern(fields.expression())),
        TimeSpec::Recurring(fields) => Ok(Normalized::Pattern(fields.expression())),
        TimeSpec::Relative(day) => {
            let at = resolve_relative(day, tz, now)?;
            validate_in_future(at.with_timezone(&Utc), now)?;
            Ok(Normalized::At(at))
        }
        TimeSpec::Offset(offset) => Ok(Normalized::At(offset_instant(offset, tz, now))),
    }
}

/// Resolve a day keyword against chat-local now. `Tomorrow` adds exactly 24
/// hours before the date is taken.
pub fn resolve_relative(day: &RelativeDay, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Tz>> {
    let mut local = now.with_timezone(&tz);
    if day.when == DayKeyword::Tomorrow {
        local = local + Duration::hours(24);
    }

    let naive = local
        .date_naive()
        .and_hms_opt(day.hour, day.minute, 0)
        .ok_or(ReminderError::InvalidTime {
            hour: day.hour,
            minute: day.minute,
        })?;

    local_datetime(tz, naive)
}

/// Chat-local now plus an absolute offset.
pub fn offset_instant(offset: &RepeatOffset, tz: Tz, now: DateTime<Utc>) -> DateTime<Tz> {
    now.with_timezone(&tz) + offset.duration()
}

pub fn validate_in_future(candidate: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    if candidate < now + Duration::minutes(MIN_LEAD_MINUTES) {
        return Err(ReminderError::TimeInPast);
    }
    Ok(())
}

/// Local wall-clock time to a zoned instant. Ambiguous times (DST fall-back)
/// take the earlier instant; skipped times (spring-forward) move one hour on.
fn local_datetime(tz: Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .ok_or_else(|| ReminderError::InvalidTime {
            hour: chrono::Timelike::hour(&naive),
            minute: chrono::Timelike::minute(&naive),
        })
}

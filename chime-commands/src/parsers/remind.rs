//! "/remind me ..." commands.
//!
//! Patterns are tried most specific first: the "every" forms with a number
//! must be ruled out before the bare "every [day]" form swallows them.

use anyhow::{Result, bail};
use chime_core::{CalendarFields, DayKeyword, RecurringFields, RelativeDay, RepeatOffset};
use regex::{Captures, Regex};

use super::words::{AT_CLAUSE, MONTHS, WEEKDAYS, clock_time, month_number, part_of_day_hour, weekday_number};
use crate::types::{Command, When};

const PREFIX: &str = r"(?i)^/remind me";
const MESSAGE: &str = r"\s+(?P<message>.+)$";
const AT_TIME: &str = r" at (?P<hour>\d{1,2})(?:[:.](?P<minute>\d{1,2}))?\s?(?P<ampm>am|pm)?";
const UNIT: &str = "minutes|minute|hours|hour|days|day";
const ORDINAL: &str = r"(?P<day>\d{1,2})(?:st|nd|rd|th)?";
const PART_OF_DAY: &str = "morning|afternoon|evening|night";

type Builder = fn(&Captures<'_>) -> Result<When>;

/// Parse a "/remind me" command. `Ok(None)` when no pattern matches.
pub fn parse_remind(text: &str) -> Result<Option<Command>> {
    let patterns: [(String, Builder); 9] = [
        (
            format!(
                r"{PREFIX} (?P<kind>in|every) (?P<a1>\d{{1,2}}) (?P<u1>{UNIT})(?:,? (?P<a2>\d{{1,2}}) (?P<u2>{UNIT}))?(?:,? (?P<a3>\d{{1,2}}) (?P<u3>{UNIT}))?{MESSAGE}"
            ),
            duration,
        ),
        (
            format!(r"{PREFIX} every {ORDINAL} of (?P<month>{MONTHS}){AT_CLAUSE}{MESSAGE}"),
            every_day_of_month,
        ),
        (
            format!(r"{PREFIX} every {ORDINAL} of the month{AT_CLAUSE}{MESSAGE}"),
            every_day_of_month,
        ),
        (
            format!(r"{PREFIX} every (?P<weekday>{WEEKDAYS})(?: (?P<part>{PART_OF_DAY}))?{AT_CLAUSE}{MESSAGE}"),
            every_weekday,
        ),
        (
            format!(
                r"{PREFIX} every(?: (?P<when>day|{PART_OF_DAY}|weekday|weekend))?{AT_CLAUSE}{MESSAGE}"
            ),
            every_day,
        ),
        (
            format!(r"{PREFIX} on the {ORDINAL}(?: of (?P<month>{MONTHS}))?{AT_CLAUSE}{MESSAGE}"),
            on_day_of_month,
        ),
        (
            format!(
                r"{PREFIX} (?P<when>today|this afternoon|this evening|tonight|tomorrow morning|tomorrow afternoon|tomorrow evening|tomorrow){AT_CLAUSE}{MESSAGE}"
            ),
            relative_day,
        ),
        (
            format!(r"{PREFIX}(?: on)? (?P<weekday>{WEEKDAYS})(?: (?P<part>{PART_OF_DAY}))?{AT_CLAUSE}{MESSAGE}"),
            on_weekday,
        ),
        (format!(r"{PREFIX}{AT_TIME}{MESSAGE}"), today_at),
    ];

    for (pattern, build) in patterns {
        let re = Regex::new(&pattern)?;
        if let Some(caps) = re.captures(text) {
            let when = build(&caps)?;
            let message = caps["message"].trim().to_string();
            return Ok(Some(Command::Remind { when, message }));
        }
    }
    Ok(None)
}

fn lower(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().to_lowercase())
}

fn number(caps: &Captures<'_>, name: &str) -> Result<Option<u32>> {
    match caps.name(name) {
        Some(m) => Ok(Some(m.as_str().parse()?)),
        None => Ok(None),
    }
}

fn duration(caps: &Captures<'_>) -> Result<When> {
    let mut offset = RepeatOffset::default();
    for (amount, unit) in [("a1", "u1"), ("a2", "u2"), ("a3", "u3")] {
        let (Some(n), Some(unit)) = (number(caps, amount)?, lower(caps, unit)) else {
            continue;
        };
        match unit.trim_end_matches('s') {
            "minute" => offset.minutes += n,
            "hour" => offset.hours += n,
            "day" => offset.days += n,
            other => bail!("unknown unit {other}"),
        }
    }
    if offset == RepeatOffset::default() {
        bail!("the duration must be longer than zero");
    }

    match lower(caps, "kind").as_deref() {
        Some("every") => Ok(When::Every(offset)),
        _ => Ok(When::In(offset)),
    }
}

/// Hour and minute from the "at" clause, or the part-of-day default.
fn time_of_day(caps: &Captures<'_>, part: Option<&str>) -> Result<(u32, u32)> {
    Ok(clock_time(caps)?.unwrap_or((part_of_day_hour(part), 0)))
}

fn month(caps: &Captures<'_>) -> Result<Option<u32>> {
    match lower(caps, "month") {
        Some(name) => match month_number(&name) {
            Some(n) => Ok(Some(n)),
            None => bail!("unknown month {name}"),
        },
        None => Ok(None),
    }
}

fn weekday(caps: &Captures<'_>) -> Result<u32> {
    let name = lower(caps, "weekday").unwrap_or_default();
    match weekday_number(&name) {
        Some(n) => Ok(n),
        None => bail!("unknown day {name}"),
    }
}

fn day_of_month(caps: &Captures<'_>) -> Result<u32> {
    let day = number(caps, "day")?.unwrap_or(0);
    if !(1..=31).contains(&day) {
        bail!("{day} is not a day of the month");
    }
    Ok(day)
}

fn every_day_of_month(caps: &Captures<'_>) -> Result<When> {
    let (hour, minute) = time_of_day(caps, None)?;
    Ok(When::Recurring(RecurringFields {
        minute: minute.to_string(),
        hour: hour.to_string(),
        day_of_month: day_of_month(caps)?.to_string(),
        month: month(caps)?.map(|m| m.to_string()).unwrap_or_default(),
        day_of_week: String::new(),
    }))
}

fn every_weekday(caps: &Captures<'_>) -> Result<When> {
    let part = lower(caps, "part");
    let (hour, minute) = time_of_day(caps, part.as_deref())?;
    Ok(When::Recurring(RecurringFields {
        minute: minute.to_string(),
        hour: hour.to_string(),
        day_of_week: weekday(caps)?.to_string(),
        ..RecurringFields::default()
    }))
}

fn every_day(caps: &Captures<'_>) -> Result<When> {
    let when = lower(caps, "when");
    let (hour, minute) = time_of_day(caps, when.as_deref())?;
    let day_of_week = match when.as_deref() {
        Some("weekday") => "1-5",
        Some("weekend") => "6,0",
        _ => "",
    };
    Ok(When::Recurring(RecurringFields {
        minute: minute.to_string(),
        hour: hour.to_string(),
        day_of_week: day_of_week.to_string(),
        ..RecurringFields::default()
    }))
}

fn on_day_of_month(caps: &Captures<'_>) -> Result<When> {
    let (hour, minute) = time_of_day(caps, None)?;
    Ok(When::On(CalendarFields {
        day_of_month: Some(day_of_month(caps)?),
        month: month(caps)?,
        day_of_week: None,
        hour,
        minute,
    }))
}

fn on_weekday(caps: &Captures<'_>) -> Result<When> {
    let part = lower(caps, "part");
    let (hour, minute) = time_of_day(caps, part.as_deref())?;
    Ok(When::On(CalendarFields {
        day_of_week: Some(weekday(caps)?.to_string()),
        hour,
        minute,
        ..CalendarFields::default()
    }))
}

fn relative_day(caps: &Captures<'_>) -> Result<When> {
    let when = lower(caps, "when").unwrap_or_default();
    let (day, part) = match when.as_str() {
        "today" => (DayKeyword::Today, None),
        "this afternoon" => (DayKeyword::Today, Some("afternoon")),
        "this evening" | "tonight" => (DayKeyword::Today, Some("evening")),
        "tomorrow" | "tomorrow morning" => (DayKeyword::Tomorrow, None),
        "tomorrow afternoon" => (DayKeyword::Tomorrow, Some("afternoon")),
        "tomorrow evening" => (DayKeyword::Tomorrow, Some("evening")),
        other => bail!("time not recognised: {other}"),
    };
    let (hour, minute) = time_of_day(caps, part)?;
    Ok(When::Relative(RelativeDay {
        when: day,
        hour,
        minute,
    }))
}

fn today_at(caps: &Captures<'_>) -> Result<When> {
    let (hour, minute) = time_of_day(caps, None)?;
    Ok(When::Relative(RelativeDay {
        when: DayKeyword::Today,
        hour,
        minute,
    }))
}

//! Recurrence expressions.
//!
//! A recurrence expression is the 5-field text `minute hour day-of-month month
//! day-of-week` where each field is `*`, a literal, or a comma/range list.
//! It never embeds a timezone: the zone is supplied when the expression is
//! evaluated (see [`next_after`]).
//!
//! Evaluation goes through the `cron` crate, which wants a leading seconds
//! field and numbers Sunday as 1. Both differences are bridged in [`compile`]:
//! the seconds field is pinned to `0` and numeric weekdays are rewritten to
//! names, so `0` and `7` keep meaning Sunday. A restricted day-of-month and
//! a restricted day-of-week are both required to match, unlike classic cron.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ReminderError, Result};

const WILDCARD: &str = "*";

const WEEKDAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecurrenceExpr(String);

impl RecurrenceExpr {
    /// Wrap already-formatted expression text. Nothing is validated here; a
    /// malformed expression is rejected when it is armed.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into().trim().to_string())
    }

    /// Join raw field tokens in minute-hour-day-month-weekday order.
    /// Empty tokens become `*`.
    pub fn from_fields(
        minute: &str,
        hour: &str,
        day_of_month: &str,
        month: &str,
        day_of_week: &str,
    ) -> Self {
        let fields = [minute, hour, day_of_month, month, day_of_week].map(|f| {
            let f = f.trim();
            if f.is_empty() { WILDCARD } else { f }
        });
        Self(fields.join(" "))
    }

    /// Expression matching exactly the minute/hour/day/month of `at`, any weekday.
    pub fn pinned<Z: TimeZone>(at: &DateTime<Z>) -> Self {
        Self(format!(
            "{} {} {} {} *",
            at.minute(),
            at.hour(),
            at.day(),
            at.month()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecurrenceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compile an expression into an evaluable schedule.
pub fn compile(expr: &RecurrenceExpr) -> Result<cron::Schedule> {
    let arm_error = |reason: String| ReminderError::SchedulerArm {
        expression: expr.to_string(),
        reason,
    };

    let fields: Vec<&str> = expr.as_str().split_whitespace().collect();
    if fields.len() != 5 {
        return Err(arm_error(format!("expected 5 fields, found {}", fields.len())));
    }

    let weekday = translate_weekdays(fields[4]).map_err(arm_error)?;
    let widened = format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], weekday
    );

    cron::Schedule::from_str(&widened).map_err(|e| arm_error(e.to_string()))
}

/// First occurrence strictly after `after`, evaluated in `tz`.
pub fn next_after(schedule: &cron::Schedule, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .after(&after.with_timezone(&tz))
        .next()
        .map(|dt| dt.with_timezone(&Utc))
}

fn translate_weekdays(field: &str) -> std::result::Result<String, String> {
    let items = field
        .split(',')
        .map(|item| {
            let (base, step) = match item.split_once('/') {
                Some((base, step)) => (base, Some(step)),
                None => (item, None),
            };
            let base = match base.split_once('-') {
                Some((lo, hi)) => format!("{}-{}", weekday_token(lo)?, weekday_token(hi)?),
                None => weekday_token(base)?,
            };
            Ok(match step {
                Some(step) => format!("{base}/{step}"),
                None => base,
            })
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;
    Ok(items.join(","))
}

fn weekday_token(token: &str) -> std::result::Result<String, String> {
    match token.parse::<usize>() {
        Ok(n) => WEEKDAY_NAMES
            .get(n)
            .map(|name| name.to_string())
            .ok_or_else(|| format!("day-of-week {n} out of range")),
        Err(_) => Ok(token.to_string()),
    }
}

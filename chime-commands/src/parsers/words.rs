//! Word tables and the shared "at H[:MM][am|pm]" clause.

use anyhow::{Result, bail};
use chime_core::convert_to_24h;
use regex::Captures;

/// Regex fragment for an optional time clause. Groups: hour, minute, ampm.
pub const AT_CLAUSE: &str = r"(?:\s*at (?P<hour>\d{1,2})(?:[:.](?P<minute>\d{1,2}))?\s?(?P<ampm>am|pm)?)?";

pub const MONTHS: &str =
    "january|february|march|april|may|june|july|august|september|october|november|december";

pub const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";

/// Month name to 1-12.
pub fn month_number(name: &str) -> Option<u32> {
    let n = match name.to_lowercase().as_str() {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        "december" => 12,
        _ => return None,
    };
    Some(n)
}

/// Weekday name to 0-6, Sunday first.
pub fn weekday_number(name: &str) -> Option<u32> {
    let n = match name.to_lowercase().as_str() {
        "sunday" => 0,
        "monday" => 1,
        "tuesday" => 2,
        "wednesday" => 3,
        "thursday" => 4,
        "friday" => 5,
        "saturday" => 6,
        _ => return None,
    };
    Some(n)
}

/// Default hour for a part of the day. Unknown or absent means 09:00.
pub fn part_of_day_hour(part: Option<&str>) -> u32 {
    match part {
        Some("afternoon") => 15,
        Some("evening") | Some("night") | Some("tonight") => 20,
        _ => 9,
    }
}

/// The 24-hour (hour, minute) of an "at" clause, if one was given.
pub fn clock_time(caps: &Captures<'_>) -> Result<Option<(u32, u32)>> {
    let Some(hour) = caps.name("hour") else {
        return Ok(None);
    };
    let hour: u32 = hour.as_str().parse()?;
    let minute: u32 = match caps.name("minute") {
        Some(m) => m.as_str().parse()?,
        None => 0,
    };
    let meridiem = caps
        .name("ampm")
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();

    if !meridiem.is_empty() && !(1..=12).contains(&hour) {
        bail!("{hour}{meridiem} is not a valid time");
    }
    let (hour, minute) = convert_to_24h(hour, minute, &meridiem);
    if hour > 23 || minute > 59 {
        bail!("{hour:02}:{minute:02} is not a valid time");
    }
    Ok(Some((hour, minute)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn at(text: &str) -> Result<Option<(u32, u32)>> {
        let re = Regex::new(&format!("^x{AT_CLAUSE}$")).unwrap();
        let caps = re.captures(text).unwrap();
        clock_time(&caps)
    }

    #[test]
    fn test_names_map_to_numbers() {
        assert_eq!(month_number("December"), Some(12));
        assert_eq!(month_number("smarch"), None);
        assert_eq!(weekday_number("Sunday"), Some(0));
        assert_eq!(weekday_number("saturday"), Some(6));
    }

    #[test]
    fn test_at_clause_variants() {
        assert_eq!(at("x").unwrap(), None);
        assert_eq!(at("x at 8").unwrap(), Some((8, 0)));
        assert_eq!(at("x at 8:23").unwrap(), Some((8, 23)));
        assert_eq!(at("x at 8.23pm").unwrap(), Some((20, 23)));
        assert_eq!(at("x at 12am").unwrap(), Some((0, 0)));
        assert_eq!(at("x at 9 pm").unwrap(), Some((21, 0)));
        assert_eq!(at("x at 21:00").unwrap(), Some((21, 0)));
    }

    #[test]
    fn test_at_clause_rejects_impossible_times() {
        assert!(at("x at 13pm").is_err());
        assert!(at("x at 25").is_err());
        assert!(at("x at 10:75").is_err());
    }

    #[test]
    fn test_part_of_day_defaults() {
        assert_eq!(part_of_day_hour(Some("morning")), 9);
        assert_eq!(part_of_day_hour(Some("afternoon")), 15);
        assert_eq!(part_of_day_hour(Some("night")), 20);
        assert_eq!(part_of_day_hour(None), 9);
    }
}

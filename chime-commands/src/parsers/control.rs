//! Commands that act on existing reminders or on the chat's settings.

use anyhow::{Context, Result, bail};
use chime_core::{DayKeyword, RelativeDay, ReminderId, RepeatOffset, SnoozeTarget};
use regex::Regex;

use crate::types::Command;

/// Parse a management command. `Ok(None)` when `text` is not one.
pub fn parse_control(text: &str) -> Result<Option<Command>> {
    let text = text.trim();
    let simple = match text {
        "/remindlist" => Some(Command::List),
        "/remindhelp" => Some(Command::Help),
        "/gettimezone" => Some(Command::GetTimezone),
        "/removecompleted" => Some(Command::RemoveCompleted),
        _ => None,
    };
    if simple.is_some() {
        return Ok(simple);
    }

    let with_id = Regex::new(r"^/(?P<verb>r|reminddelete|complete)_?\s*(?P<id>\d+)$")?;
    if let Some(caps) = with_id.captures(text) {
        let id = reminder_id(&caps["id"])?;
        let command = match &caps["verb"] {
            "r" => Command::Detail(id),
            "reminddelete" => Command::Delete(id),
            _ => Command::Complete(id),
        };
        return Ok(Some(command));
    }

    let snooze = Regex::new(r"^/snooze_?\s*(?P<id>\d+)\s+(?P<target>\S+)$")?;
    if let Some(caps) = snooze.captures(text) {
        return Ok(Some(Command::Snooze {
            id: reminder_id(&caps["id"])?,
            target: snooze_target(&caps["target"])?,
        }));
    }

    if let Some(rest) = text.strip_prefix("/settimezone") {
        let zone = rest.trim();
        if zone.is_empty() {
            bail!("usage: /settimezone Area/City");
        }
        return Ok(Some(Command::SetTimezone(zone.to_string())));
    }

    Ok(None)
}

fn reminder_id(s: &str) -> Result<ReminderId> {
    s.parse()
        .with_context(|| format!("invalid reminder id {s}"))
}

/// Snooze choices offered under a fired notification.
pub fn snooze_target(choice: &str) -> Result<SnoozeTarget> {
    let at = |when, hour| SnoozeTarget::At(RelativeDay { when, hour, minute: 0 });
    let target = match choice.to_lowercase().as_str() {
        "10m" => SnoozeTarget::In(RepeatOffset::minutes(10)),
        "20m" => SnoozeTarget::In(RepeatOffset::minutes(20)),
        "30m" => SnoozeTarget::In(RepeatOffset::minutes(30)),
        "1h" => SnoozeTarget::In(RepeatOffset::minutes(60)),
        "afternoon" => at(DayKeyword::Today, 15),
        "evening" => at(DayKeyword::Today, 20),
        "tomorrow" => at(DayKeyword::Tomorrow, 9),
        "tomorrow-afternoon" => at(DayKeyword::Tomorrow, 15),
        "tomorrow-evening" => at(DayKeyword::Tomorrow, 20),
        other => bail!(
            "unknown snooze option {other}; use 10m, 20m, 30m, 1h, afternoon, evening, tomorrow, tomorrow-afternoon or tomorrow-evening"
        ),
    };
    Ok(target)
}

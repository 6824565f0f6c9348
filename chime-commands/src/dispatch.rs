//! Runs parsed commands against the engine and renders the chat reply.

use anyhow::Result;
use chime_core::{ChatId, Detail, Engine, Reminder, ReminderList, format_local};
use chrono_tz::Tz;

use crate::help::HELP_TEXT;
use crate::parsers::parse_command;
use crate::types::{Command, When};

/// Parse and execute one message from `chat_id`, returning the reply text.
/// `text` is stored on created reminders as their originating command.
pub fn handle_message(engine: &Engine, chat_id: ChatId, text: &str) -> Result<String> {
    let command = parse_command(text)?;
    execute(engine, chat_id, text.trim(), command)
}

pub fn execute(engine: &Engine, chat_id: ChatId, text: &str, command: Command) -> Result<String> {
    let service = &engine.service;
    let reply = match command {
        Command::Remind { when, message } => {
            let scheduled = match &when {
                When::In(offset) => service.add_in(chat_id, text, *offset, &message)?,
                When::Every(offset) => service.add_every(chat_id, text, *offset, &message)?,
                When::On(fields) => service.add_on_absolute_fields(chat_id, text, fields, &message)?,
                When::Relative(day) => service.add_on_relative_keyword(chat_id, text, day, &message)?,
                When::Recurring(fields) => {
                    service.add_on_recurring_fields(chat_id, text, fields, &message)?
                }
            };
            scheduled.to_string()
        }
        Command::List => {
            let list = service.list_reminders(chat_id)?;
            let tz = engine.loader.get_timezone(chat_id)?;
            render_list(&list, tz)
        }
        Command::Detail(id) => render_detail(&service.reminder_detail(chat_id, id)?),
        Command::Delete(id) => {
            let deleted = service.delete_reminder(chat_id, id)?;
            format!("Reminder \"{}\" has been deleted", deleted.payload.message)
        }
        Command::Complete(id) => {
            let done = service.complete_reminder(chat_id, id)?;
            format!("Reminder \"{}\" has been completed", done.payload.message)
        }
        Command::Snooze { id, target } => service.snooze(chat_id, id, target)?.to_string(),
        Command::RemoveCompleted => {
            let removed = service.remove_completed(chat_id)?;
            format!("Removed {removed} completed reminder(s)")
        }
        Command::GetTimezone => {
            let tz = engine.loader.get_timezone(chat_id)?;
            format!("Your current timezone is {}", tz.name())
        }
        Command::SetTimezone(zone) => {
            let tz = engine.loader.set_timezone(chat_id, &zone)?;
            format!("Your timezone has been set to {}", tz.name())
        }
        Command::Help => HELP_TEXT.trim().to_string(),
    };
    Ok(reply)
}

fn list_line(r: &Reminder, tz: Tz) -> String {
    match (r.next_fire_at, r.completed_at) {
        (Some(next), _) if r.is_active() => {
            format!("/r_{} {} ({})", r.id, r.payload.message, format_local(next, tz))
        }
        (_, Some(done)) => format!("/r_{} {} (done {})", r.id, r.payload.message, format_local(done, tz)),
        _ => format!("/r_{} {}", r.id, r.payload.message),
    }
}

pub fn render_list(list: &ReminderList, tz: Tz) -> String {
    if list.is_empty() {
        return "You have no reminders".to_string();
    }
    let mut sections = Vec::new();
    for (title, group) in [
        ("Active", &list.active),
        ("Inactive", &list.inactive),
        ("Completed", &list.completed),
    ] {
        if group.is_empty() {
            continue;
        }
        let lines: Vec<String> = group.iter().map(|r| list_line(r, tz)).collect();
        sections.push(format!("*{title}*\n{}", lines.join("\n")));
    }
    if !list.completed.is_empty() {
        sections.push("/removecompleted".to_string());
    }
    sections.join("\n\n")
}

pub fn render_detail(detail: &Detail) -> String {
    let r = &detail.reminder;
    let mut lines = vec![
        format!("Reminder /r_{}", r.id),
        format!("Message: {}", r.payload.message),
        format!("Schedule: {} ({})", r.schedule, detail.timezone.name()),
        format!("Status: {:?}", r.status),
    ];
    if let Some(next) = detail.next_fire_local() {
        lines.push(format!("Next: {}", next.format(chime_core::service::DISPLAY_FORMAT)));
    }
    if let Some(done) = detail.completed_local() {
        lines.push(format!("Completed: {}", done.format(chime_core::service::DISPLAY_FORMAT)));
    }
    lines.push(format!("/reminddelete_{}", r.id));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::testing::{FixedClock, ManualTimer, RecordingNotifier};
    use chime_core::{ChatPreference, ChatPreferenceStore, MemoryStore, ReminderStatus, ReminderStore};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn engine() -> (Arc<MemoryStore>, Engine) {
        let clock = Arc::new(FixedClock::at(Utc.with_ymd_and_hms(2020, 4, 1, 6, 45, 0).unwrap()));
        let timer = Arc::new(ManualTimer::new(clock.clone()));
        let store = Arc::new(MemoryStore::new());
        for chat_id in [1, 2] {
            store
                .upsert_preference(&ChatPreference {
                    chat_id,
                    timezone: "Asia/Ho_Chi_Minh".to_string(),
                })
                .unwrap();
        }
        let engine = Engine::new(store.clone(), timer, Arc::new(RecordingNotifier::new()), clock);
        (store, engine)
    }

    #[test]
    fn test_remind_reply_and_stored_command() {
        let (store, engine) = engine();
        let text = "/remind me in 1 minute, 2 hours, 3 days Update your report";
        let reply = handle_message(&engine, 1, text).unwrap();
        assert!(reply.starts_with("Reminder \"Update your report\" has been added for Sat, 04 Apr 2020 15:46"));

        let stored = &store.list_by_chat(1).unwrap()[0];
        assert_eq!(stored.payload.command, text);
        assert_eq!(stored.schedule.as_str(), "46 15 4 4 *");
    }

    #[test]
    fn test_past_time_is_reported() {
        let (_, engine) = engine();
        let err = handle_message(&engine, 1, "/remind me today at 9 too late").unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn test_list_detail_complete_flow() {
        let (store, engine) = engine();
        handle_message(&engine, 1, "/remind me every day at 8pm water plants").unwrap();
        handle_message(&engine, 1, "/remind me in 10 minutes call back").unwrap();

        let list = handle_message(&engine, 1, "/remindlist").unwrap();
        assert!(list.starts_with("*Active*\n/r_1 water plants (Wed, 01 Apr 2020 20:00"));
        assert!(list.contains("/r_2 call back"));

        let detail = handle_message(&engine, 1, "/r_1").unwrap();
        assert!(detail.contains("Schedule: 0 20 * * * (Asia/Ho_Chi_Minh)"));
        assert!(detail.contains("Next: Wed, 01 Apr 2020 20:00"));

        handle_message(&engine, 1, "/complete 1").unwrap();
        assert_eq!(store.get_reminder(1, 1).unwrap().status, ReminderStatus::Completed);
        let list = handle_message(&engine, 1, "/remindlist").unwrap();
        assert!(list.contains("*Completed*\n/r_1 water plants (done"));
        assert!(list.ends_with("/removecompleted"));

        assert_eq!(
            handle_message(&engine, 1, "/removecompleted").unwrap(),
            "Removed 1 completed reminder(s)"
        );
    }

    #[test]
    fn test_other_chat_cannot_delete() {
        let (_, engine) = engine();
        handle_message(&engine, 1, "/remind me in 10 minutes call back").unwrap();
        let err = handle_message(&engine, 2, "/reminddelete_1").unwrap_err();
        assert!(err.to_string().contains("not allowed"));
        assert_eq!(
            handle_message(&engine, 1, "/reminddelete_1").unwrap(),
            "Reminder \"call back\" has been deleted"
        );
    }

    #[test]
    fn test_timezone_commands() {
        let (_, engine) = engine();
        assert_eq!(
            handle_message(&engine, 1, "/gettimezone").unwrap(),
            "Your current timezone is Asia/Ho_Chi_Minh"
        );
        assert_eq!(
            handle_message(&engine, 1, "/settimezone Europe/London").unwrap(),
            "Your timezone has been set to Europe/London"
        );
        assert!(handle_message(&engine, 1, "/settimezone Nowhere/Land").is_err());
    }

    #[test]
    fn test_snooze_copies_message() {
        let (_, engine) = engine();
        handle_message(&engine, 1, "/remind me every day at 8pm water plants").unwrap();
        let reply = handle_message(&engine, 1, "/snooze 1 10m").unwrap();
        assert!(reply.starts_with("Reminder \"water plants\" has been added for Wed, 01 Apr 2020 13:55"));
    }
}

//! Outbound notification contract (the chat transport is an external collaborator).

use crate::error::Result;
use crate::reminder::{ChatId, Reminder, ReminderId};

/// Inline controls attached to a fired notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Snooze(ReminderId),
    Complete(ReminderId),
}

pub trait Notifier: Send + Sync {
    fn send(&self, recipient: ChatId, text: &str, controls: &[Control]) -> Result<()>;
}

pub fn notification_text(reminder: &Reminder) -> String {
    format!("🗓 {}", reminder.payload.message)
}

/// Snooze is always offered; "mark complete" only when the reminder would
/// otherwise keep firing.
pub fn controls_for(reminder: &Reminder) -> Vec<Control> {
    let mut controls = vec![Control::Snooze(reminder.id)];
    if !reminder.is_one_shot() {
        controls.push(Control::Complete(reminder.id));
    }
    controls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::RepeatOffset;
    use crate::schedule::RecurrenceExpr;
    use chrono::Utc;

    fn reminder() -> Reminder {
        let mut r = Reminder::new(1, RecurrenceExpr::new("5 10 2 4 *"), "/remind me", "stretch", Utc::now());
        r.id = 11;
        r
    }

    #[test]
    fn one_shot_gets_snooze_only() {
        assert_eq!(controls_for(&reminder()), vec![Control::Snooze(11)]);
    }

    #[test]
    fn repeating_reminders_can_be_completed() {
        let every = reminder().repeating_every(RepeatOffset::minutes(5));
        assert_eq!(
            controls_for(&every),
            vec![Control::Snooze(11), Control::Complete(11)]
        );
        let weekly = reminder().recurring();
        assert!(controls_for(&weekly).contains(&Control::Complete(11)));
    }

    #[test]
    fn text_carries_the_message() {
        assert_eq!(notification_text(&reminder()), "🗓 stretch");
    }
}

use chime_core::{ChatId, Control, Notifier, Result};

/// Prints notifications to stdout, with the controls spelled out as the
/// commands that perform them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, recipient: ChatId, text: &str, controls: &[Control]) -> Result<()> {
        println!("{}", render(recipient, text, controls));
        Ok(())
    }
}

fn control_command(control: &Control) -> String {
    match control {
        Control::Snooze(id) => format!("/snooze {id} 10m"),
        Control::Complete(id) => format!("/complete {id}"),
    }
}

pub fn render(recipient: ChatId, text: &str, controls: &[Control]) -> String {
    let mut out = format!("[chat {recipient}] {text}");
    if !controls.is_empty() {
        let commands: Vec<String> = controls.iter().map(control_command).collect();
        out.push_str(&format!("\n  {}", commands.join("  |  ")));
    }
    out
}

pub mod control;
pub mod remind;
pub mod words;

use anyhow::{Result, bail};

use crate::types::Command;

/// Parse one chat message into a command.
pub fn parse_command(text: &str) -> Result<Command> {
    let text = text.trim();
    if let Some(command) = control::parse_control(text)? {
        return Ok(command);
    }
    if let Some(command) = remind::parse_remind(text)? {
        return Ok(command);
    }
    if text.to_lowercase().starts_with("/remind me") {
        bail!("could not work out when to remind you; see /remindhelp");
    }
    bail!("unknown command {text:?}; see /remindhelp")
}

//! chime-commands: the chat command language and its dispatcher.

pub mod dispatch;
pub mod help;
pub mod parsers;
pub mod types;

pub use dispatch::{execute, handle_message};
pub use help::HELP_TEXT;
pub use parsers::parse_command;
pub use types::{Command, When};

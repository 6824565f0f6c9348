//! Interactive console session: stdin lines are chat messages, fired
//! reminders print as they arrive.

use std::sync::Arc;

use anyhow::Result;
use chime_commands::handle_message;
use chime_core::{ChatId, Engine, FireEvent, FireHandler, FireOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error};

/// Hand each fire event to the handler on the blocking pool.
pub async fn dispatch_fires(fire: Arc<FireHandler>, mut events: UnboundedReceiver<FireEvent>) {
    while let Some(event) = events.recv().await {
        let fire = fire.clone();
        match tokio::task::spawn_blocking(move || fire.handle(event)).await {
            Ok(FireOutcome::Ignored) => debug!(handle = event.handle.0, "stale fire ignored"),
            Ok(outcome) => debug!(reminder_id = event.target.reminder_id, ?outcome, "fired"),
            Err(e) => error!(reminder_id = event.target.reminder_id, "fire handler panicked: {e}"),
        }
    }
}

/// Run one command on the blocking pool and render the outcome.
pub async fn reply(engine: Arc<Engine>, chat_id: ChatId, line: String) -> String {
    let result = tokio::task::spawn_blocking(move || handle_message(&engine, chat_id, &line)).await;
    match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => format!("Error: {e:#}"),
        Err(e) => format!("Error: command panicked: {e}"),
    }
}

pub async fn run_session(
    engine: Arc<Engine>,
    chat_id: ChatId,
    events: UnboundedReceiver<FireEvent>,
) -> Result<()> {
    let dispatcher = tokio::spawn(dispatch_fires(engine.fire.clone(), events));

    println!("chime: chat {chat_id}. Type /remindhelp for commands, /quit to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }
        println!("{}", reply(engine.clone(), chat_id, line).await);
    }

    dispatcher.abort();
    Ok(())
}

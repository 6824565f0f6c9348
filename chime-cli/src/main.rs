use anyhow::{Context, Result, bail};
use chime_commands::{Command as Cmd, execute};
use chime_core::{ChatId, Engine, FireEvent, MemoryStore, SystemClock};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod chat;
mod config;
mod file_store;
mod lock;
mod notifier;
mod state;
mod timer;

use config::Config;
use file_store::JsonFileStore;
use lock::StoreLock;
use notifier::ConsoleNotifier;
use timer::TokioTimer;

#[derive(Parser, Debug)]
#[command(name = "chime", version, about = "Chat reminder scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive session: type chat commands, reminders fire in this terminal
    Run {
        /// Chat to act as (default: first of [chat].allowed_chats)
        #[arg(long)]
        chat: Option<ChatId>,
    },

    /// Execute a single chat command and print the reply
    Send {
        #[arg(long)]
        chat: Option<ChatId>,

        /// The command, e.g. `/remind me in 5 minutes stretch`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// List a chat's reminders grouped by status
    List {
        #[arg(long)]
        chat: Option<ChatId>,
    },

    /// Show or change a chat's timezone
    Timezone {
        #[arg(long)]
        chat: Option<ChatId>,

        #[command(subcommand)]
        command: TimezoneCommand,
    },

    /// Config file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TimezoneCommand {
    Get,

    /// Re-arms the chat's active reminders in the new zone
    Set {
        /// IANA zone, e.g. Europe/London
        zone: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config to $CHIME_HOME/config.toml
    Init,

    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    init_logging(&cfg);

    match cli.command {
        Command::Run { chat } => {
            let chat_id = resolve_chat(&cfg, chat)?;
            let (engine, events, _lock) = build_engine(&cfg)?;
            chat::run_session(engine, chat_id, events).await?;
        }

        Command::Send { chat, text } => {
            let chat_id = resolve_chat(&cfg, chat)?;
            let (engine, _events, _lock) = build_engine(&cfg)?;
            let reply = chime_commands::handle_message(&engine, chat_id, &text.join(" "))?;
            println!("{reply}");
        }

        Command::List { chat } => {
            let chat_id = resolve_chat(&cfg, chat)?;
            let engine = read_only_engine(&cfg)?;
            println!("{}", execute(&engine, chat_id, "/remindlist", Cmd::List)?);
        }

        Command::Timezone { chat, command } => {
            let chat_id = resolve_chat(&cfg, chat)?;
            let reply = match command {
                TimezoneCommand::Get => {
                    let engine = read_only_engine(&cfg)?;
                    execute(&engine, chat_id, "/gettimezone", Cmd::GetTimezone)?
                }
                TimezoneCommand::Set { zone } => {
                    let (engine, _events, _lock) = build_engine(&cfg)?;
                    let text = format!("/settimezone {zone}");
                    execute(&engine, chat_id, &text, Cmd::SetTimezone(zone))?
                }
            };
            println!("{reply}");
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                println!("# {}", config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

fn init_logging(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_chat(cfg: &Config, chat: Option<ChatId>) -> Result<ChatId> {
    let chat_id = chat.unwrap_or_else(|| cfg.primary_chat());
    if !cfg.chat.allowed_chats.contains(&chat_id) {
        bail!("chat {chat_id} is not in [chat].allowed_chats");
    }
    Ok(chat_id)
}

/// Take the store lock, open the store, seed chat preferences and re-arm
/// everything persisted. The engine writes to the store only while the
/// returned lock is alive.
fn build_engine(cfg: &Config) -> Result<(Arc<Engine>, UnboundedReceiver<FireEvent>, StoreLock)> {
    let path = cfg.store_path()?;
    let lock = StoreLock::acquire(&path)?;
    let store = Arc::new(
        JsonFileStore::open(&path).with_context(|| format!("open store {}", path.display()))?,
    );
    let (tx, rx) = mpsc::unbounded_channel();
    let timer = Arc::new(TokioTimer::new(tx));
    let engine = Engine::new(
        store,
        timer.clone(),
        Arc::new(ConsoleNotifier),
        Arc::new(SystemClock),
    );

    let seeded = engine
        .loader
        .ensure_default_preferences(&cfg.chat.allowed_chats, &cfg.chat.default_timezone)?;
    let armed = engine.loader.rehydrate_all()?;
    info!(
        store = %path.display(),
        seeded,
        armed,
        live = timer.live_count(),
        "reminders loaded"
    );
    Ok((Arc::new(engine), rx, lock))
}

/// Engine over an in-memory copy of the store. Nothing is armed and nothing
/// is written back, so it needs no lock and may run beside a session.
fn read_only_engine(cfg: &Config) -> Result<Engine> {
    let path = cfg.store_path()?;
    let state =
        JsonFileStore::read_state(&path).with_context(|| format!("read store {}", path.display()))?;
    let (tx, _rx) = mpsc::unbounded_channel();
    let engine = Engine::new(
        Arc::new(MemoryStore::with_state(state)),
        Arc::new(TokioTimer::new(tx)),
        Arc::new(ConsoleNotifier),
        Arc::new(SystemClock),
    );
    engine
        .loader
        .ensure_default_preferences(&cfg.chat.allowed_chats, &cfg.chat.default_timezone)?;
    Ok(engine)
}

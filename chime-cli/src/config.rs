use anyhow::{Context, Result, bail};
use chime_core::{ChatId, DEFAULT_TIMEZONE, parse_timezone};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::{default_store_path, ensure_chime_home};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    /// Zone seeded for chats that have none stored.
    pub default_timezone: String,
    /// Chats that get a default preference at startup.
    pub allowed_chats: Vec<ChatId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    /// Reminder file, relative paths resolved against `$CHIME_HOME`.
    /// Defaults to `$CHIME_HOME/reminders.json`.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing` env-filter directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            allowed_chats: vec![1],
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        parse_timezone(&self.chat.default_timezone)
            .context("[chat].default_timezone")?;
        if self.chat.allowed_chats.is_empty() {
            bail!("[chat].allowed_chats must name at least one chat");
        }
        Ok(())
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.storage.file {
            Some(p) if p.is_absolute() => Ok(p.clone()),
            Some(p) => Ok(ensure_chime_home()?.join(p)),
            None => default_store_path(),
        }
    }

    /// Chat used when a command does not name one.
    pub fn primary_chat(&self) -> ChatId {
        self.chat.allowed_chats.first().copied().unwrap_or(1)
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_chime_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", p.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn save_config_to(p: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&p, &Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.chat.default_timezone, "Asia/Ho_Chi_Minh");
        assert_eq!(cfg.primary_chat(), 1);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.chat.default_timezone = "Europe/London".to_string();
        cfg.chat.allowed_chats = vec![42, 7];
        cfg.storage.file = Some(dir.path().join("r.json"));
        save_config_to(&p, &cfg).unwrap();

        let loaded = load_config_from(&p).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.primary_chat(), 42);
        assert_eq!(loaded.store_path().unwrap(), dir.path().join("r.json"));
    }

    #[test]
    fn test_partial_file_fills_sections() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        fs::write(&p, "[logging]\nfilter = \"debug\"\n").unwrap();
        let cfg = load_config_from(&p).unwrap();
        assert_eq!(cfg.logging.filter, "debug");
        assert_eq!(cfg.chat, ChatSection::default());
    }

    #[test]
    fn test_bad_timezone_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        fs::write(&p, "[chat]\ndefault_timezone = \"Mars/Olympus\"\n").unwrap();
        assert!(load_config_from(&p).is_err());
    }
}

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$CHIME_HOME`, else `~/.chime`.
pub fn chime_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("CHIME_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".chime"))
}

pub fn ensure_chime_home() -> Result<PathBuf> {
    let dir = chime_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn default_store_path() -> Result<PathBuf> {
    Ok(ensure_chime_home()?.join("reminders.json"))
}

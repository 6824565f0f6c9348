//! Single-writer guard for the store file.
//!
//! `<store>.lock` is created with `create_new` next to the store, stamped with
//! the owner's pid and removed when the guard drops. A second process opening
//! the same store for writing is refused while the owner is alive; a lock left
//! behind by a process that is gone is evicted.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

/// An unstamped lock younger than this may still be getting its pid written.
const UNSTAMPED_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

enum Owner {
    Running(u32),
    Starting,
    Gone,
}

impl StoreLock {
    pub fn acquire(store_path: &Path) -> Result<Self> {
        let path = store_path.with_extension("lock");
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }

        // Second attempt only after evicting a dead owner's lock.
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let lock = Self { path };
                    write!(file, "{}", process::id())
                        .with_context(|| format!("stamp {}", lock.path.display()))?;
                    debug!(lock = %lock.path.display(), "store lock acquired");
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => match owner(&path) {
                    Owner::Running(pid) => bail!(
                        "store {} is in use by chime process {pid}; remove {} if that is wrong",
                        store_path.display(),
                        path.display()
                    ),
                    Owner::Starting => bail!(
                        "store {} is being opened by another chime process",
                        store_path.display()
                    ),
                    Owner::Gone => {
                        warn!(lock = %path.display(), "removing stale store lock");
                        match fs::remove_file(&path) {
                            Ok(()) => {}
                            Err(e) if e.kind() == ErrorKind::NotFound => {}
                            Err(e) => {
                                return Err(e)
                                    .with_context(|| format!("remove stale {}", path.display()));
                            }
                        }
                    }
                },
                Err(e) => {
                    return Err(e).with_context(|| format!("create lock {}", path.display()));
                }
            }
        }
        bail!("could not acquire store lock {}", path.display())
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn owner(path: &Path) -> Owner {
    let stamp = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return Owner::Gone,
        Err(_) => return Owner::Starting,
    };
    match stamp.trim().parse::<u32>() {
        Ok(pid) if pid_alive(pid) => Owner::Running(pid),
        Ok(_) => Owner::Gone,
        Err(_) if recently_modified(path) => Owner::Starting,
        Err(_) => Owner::Gone,
    }
}

fn pid_alive(pid: u32) -> bool {
    if pid == process::id() {
        return true;
    }
    // Without procfs there is no way to tell; keep the lock.
    let proc_root = Path::new("/proc");
    !proc_root.is_dir() || proc_root.join(pid.to_string()).exists()
}

fn recently_modified(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_none_or(|age| age < UNSTAMPED_GRACE)
}

//! Central path resolution for Taskboard data files.
//!
//! Resolved once at startup from: CLI `--data-dir` > `TASKBOARD_DATA_DIR` env > `~/.taskboard`.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

static DATA_DIR: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Initialize the global data directory. Returns the resolved path.
pub fn init_data_dir(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = match explicit {
        Some(p) => p.to_path_buf(),
        None => default_data_dir()?,
    };

    let mut guard = DATA_DIR.write().unwrap_or_else(PoisonError::into_inner);
    *guard = Some(dir.clone());
    Ok(dir)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(env_val) = std::env::var("TASKBOARD_DATA_DIR") {
        if !env_val.trim().is_empty() {
            return Ok(PathBuf::from(env_val));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".taskboard"))
        .ok_or_else(|| anyhow::anyhow!("HOME directory not found; pass --data-dir"))
}

/// Current data directory. Errors if `init_data_dir` has not run.
pub fn data_dir() -> anyhow::Result<PathBuf> {
    DATA_DIR
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or_else(|| anyhow::anyhow!("data directory used before init_data_dir"))
}

pub fn config_path() -> anyhow::Result<PathBuf> {
    Ok(data_dir()?.join("config.toml"))
}

pub fn session_db_path() -> anyhow::Result<PathBuf> {
    Ok(data_dir()?.join("session.db"))
}

pub fn log_dir() -> anyhow::Result<PathBuf> {
    Ok(data_dir()?.join("logs"))
}

pub fn ensure_dirs() -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir()?)?;
    Ok(())
}

#[cfg(test)]
fn reset_data_dir() {
    *DATA_DIR.write().unwrap_or_else(PoisonError::into_inner) = None;
}

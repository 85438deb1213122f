use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Ensures that a directory exists at the specified path, creating it and any
/// missing parents if necessary.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("create directory '{}'", path.display()))?;
    }
    Ok(())
}

/// Default configuration directory: `/etc/groupgate` for root, otherwise
/// `~/.config/groupgate`.
pub fn default_config_dir() -> Result<PathBuf> {
    if is_root() {
        return Ok(PathBuf::from("/etc/groupgate"));
    }

    let home = home_dir()?;
    Ok(home.join(".config").join("groupgate"))
}

/// Default data directory: `/var/lib/groupgate` for root, otherwise
/// `~/.local/share/groupgate`.
pub fn default_data_dir() -> Result<PathBuf> {
    if is_root() {
        return Ok(PathBuf::from("/var/lib/groupgate"));
    }

    let home = home_dir()?;
    Ok(home.join(".local").join("share").join("groupgate"))
}

fn home_dir() -> Result<PathBuf> {
    let dir = std::env::var_os("HOME") // Unix/Linux/macOS
        .or_else(|| std::env::var_os("USERPROFILE")) // Windows
        .map(PathBuf::from);
    match dir {
        Some(dir) => Ok(dir),
        None => {
            bail!("could not determine home directory, please specify directories manually")
        }
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}

//! Config file location.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Application directory name under the config base.
const APP_DIR: &str = "crl";

/// Config file name.
const CONFIG_FILE: &str = "config.toml";

/// Resolves the config file path.
///
/// - If `dir` is `Some`, returns `{dir}/config.toml`.
/// - Else if `XDG_CONFIG_HOME` is set and non-empty, returns
///   `$XDG_CONFIG_HOME/crl/config.toml`.
/// - Otherwise returns `~/.config/crl/config.toml`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined (when neither
/// `dir` nor `XDG_CONFIG_HOME` is available).
pub fn resolve_config_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.join(CONFIG_FILE));
    }

    let xdg = std::env::var("XDG_CONFIG_HOME").ok();
    let home = std::env::var("HOME").ok();
    config_path_from(xdg.as_deref(), home.as_deref())
}

/// Picks the config base from the given environment values.
fn config_path_from(xdg_config_home: Option<&str>, home: Option<&str>) -> Result<PathBuf> {
    let base = match xdg_config_home.filter(|s| !s.is_empty()) {
        Some(xdg) => PathBuf::from(xdg),
        None => Path::new(home.context("HOME environment variable is not set")?).join(".config"),
    };
    Ok(base.join(APP_DIR).join(CONFIG_FILE))
}

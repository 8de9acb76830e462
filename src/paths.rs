//! Default on-disk locations, following the XDG base directory layout.

use std::ffi::OsString;
use std::path::PathBuf;

const APP_DIR: &str = "tl-gateway";

/// `$XDG_CONFIG_HOME/tl-gateway/config.toml`, or `~/.config/tl-gateway/config.toml`.
pub fn default_config_file() -> PathBuf {
    app_dir(std::env::var_os("XDG_CONFIG_HOME"), ".config").join("config.toml")
}

/// Where a `sqlite://` cache URL without a path keeps its database.
pub fn default_cache_db() -> PathBuf {
    app_dir(std::env::var_os("XDG_CACHE_HOME"), ".cache").join("translations.db")
}

/// The app directory under `base`, or under `~/<home_fallback>` when `base` is unset or empty.
fn app_dir(base: Option<OsString>, home_fallback: &str) -> PathBuf {
    base.filter(|b| !b.is_empty())
        .map_or_else(|| home_dir().join(home_fallback), PathBuf::from)
        .join(APP_DIR)
}

/// Falls back to the working directory when there is no home directory.
fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

//! Path utilities

use std::path::PathBuf;

/// Data directory (`~/.confab`)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".confab"))
        .unwrap_or_else(|| PathBuf::from(".confab"))
}

/// Config file location; `CONFAB_CONFIG` takes precedence
pub fn config_path() -> PathBuf {
    match std::env::var_os("CONFAB_CONFIG") {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => data_dir().join("config.json"),
    }
}

/// Default root of the workspace tool provider
pub fn workspace_path() -> PathBuf {
    data_dir().join("workspace")
}

/// Default thread log directory
pub fn threads_dir() -> PathBuf {
    data_dir().join("threads")
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::Config;

/// Error type for config and data directory setup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} already exists (use --force to overwrite)")]
    AlreadyExists { path: PathBuf },
}

/// Commented config written by `sc init`
pub const DEFAULT_CONFIG: &str = r#"# shortcuts configuration

[storage]
# Key the item list is cached under (cache/<key>.json)
cache_key = "shortcuts-items"
# Largest item list the cache accepts, in bytes
quota_bytes = 5242880

[file]
# Allow attaching an external data file
enabled = true
# How often the attached file is checked for outside edits
poll_interval_ms = 1500
# File name used when `sc attach` is given a directory
suggested_name = "shortcuts-data.json"

[log]
# error, warn, info, debug or trace
level = "warn"
"#;

/// Pick the data directory: the explicit flag, then $SHORTCUTS_HOME, then
/// $XDG_DATA_HOME/shortcuts, then ~/.local/share/shortcuts.
pub fn resolve_data_dir(flag: Option<&Path>) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }
    if let Some(home) = env_path("SHORTCUTS_HOME") {
        return home;
    }
    let data_home = env_path("XDG_DATA_HOME").unwrap_or_else(|| home_dir().join(".local/share"));
    data_home.join("shortcuts")
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn home_dir() -> PathBuf {
    env_path("HOME").unwrap_or_else(|| PathBuf::from("/"))
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Read `<data>/config.toml`. A missing file gives the defaults.
pub fn read_config(data_dir: &Path) -> Result<Config, ConfigError> {
    let path = config_path(data_dir);
    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => return Err(ConfigError::ReadError { path, source }),
    };
    toml::from_str(&text).map_err(|source| ConfigError::ParseError { path, source })
}

/// Create the data directory and write the default config into it.
pub fn write_default_config(data_dir: &Path, force: bool) -> Result<PathBuf, ConfigError> {
    let path = config_path(data_dir);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists { path });
    }
    fs::create_dir_all(data_dir).map_err(|source| ConfigError::WriteError {
        path: data_dir.to_path_buf(),
        source,
    })?;
    fs::write(&path, DEFAULT_CONFIG).map_err(|source| ConfigError::WriteError {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

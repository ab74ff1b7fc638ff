use serde::{Deserialize, Serialize};

/// Configuration from config.toml in the data directory.
///
/// Every section is optional; a missing file is the same as an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub file: FileConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key the item list is cached under
    #[serde(default = "default_cache_key")]
    pub cache_key: String,
    /// Largest serialized item list the cache accepts
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            cache_key: default_cache_key(),
            quota_bytes: default_quota_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Whether an external data file may be attached at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_suggested_name")]
    pub suggested_name: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
            suggested_name: default_suggested_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_key() -> String {
    "shortcuts-items".to_string()
}

/// 5 MiB, the usual browser local storage budget
fn default_quota_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_poll_interval_ms() -> u64 {
    1500
}

fn default_suggested_name() -> String {
    "shortcuts-data.json".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

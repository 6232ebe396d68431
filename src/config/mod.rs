//! Configuration for heartbeat-log.
//!
//! Loaded from `~/.heartbeat-log/config.json` when present, then overridden
//! by environment variables:
//!
//! | Variable                    | Field             |
//! |-----------------------------|-------------------|
//! | `HEARTBEAT_APP_ID`          | `app_id`          |
//! | `HEARTBEAT_STORAGE_DIR`     | `storage_dir`     |
//! | `HEARTBEAT_MAX_STORED_DAYS` | `max_stored_days` |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HeartbeatError, Result};
use crate::heartbeat::DEFAULT_MAX_STORED_DAYS;
use crate::storage::file_name_for_app;

const CONFIG_FILE: &str = "config.json";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// App whose heartbeats are stored; selects the bundle file.
    pub app_id: String,
    /// Directory holding one bundle file per app.
    pub storage_dir: PathBuf,
    /// Per-agent cap on stored days (0 = unbounded).
    pub max_stored_days: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: "default".to_string(),
            storage_dir: Self::dir().join("heartbeats"),
            max_stored_days: DEFAULT_MAX_STORED_DAYS,
        }
    }
}

impl Config {
    /// Base directory (`~/.heartbeat-log`).
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".heartbeat-log")
    }

    /// Load from the default location, then apply env overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::dir().join(CONFIG_FILE))
    }

    /// Load from `path` (defaults if missing), then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                HeartbeatError::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                HeartbeatError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            debug!("No config file at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(app_id) = lookup("HEARTBEAT_APP_ID").filter(|v| !v.trim().is_empty()) {
            self.app_id = app_id.trim().to_string();
        }
        if let Some(dir) = lookup("HEARTBEAT_STORAGE_DIR").filter(|v| !v.trim().is_empty()) {
            self.storage_dir = PathBuf::from(dir.trim());
        }
        if let Some(max) = lookup("HEARTBEAT_MAX_STORED_DAYS") {
            self.max_stored_days = max.trim().parse().map_err(|_| {
                HeartbeatError::Config(format!(
                    "HEARTBEAT_MAX_STORED_DAYS must be a non-negative integer, got {:?}",
                    max
                ))
            })?;
        }
        Ok(())
    }

    /// Bundle file for the configured app.
    pub fn storage_path(&self) -> PathBuf {
        self.storage_dir.join(file_name_for_app(&self.app_id))
    }
}

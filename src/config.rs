use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of failed replays after which a queued mutation is dropped
pub const MAX_RETRY: u32 = 5;

/// Application configuration, read from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub api: ApiSettings,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    pub max_retries: u32,
    pub interval_secs: u64,
    pub retry_delay_secs: u64,
    /// Copy mutations dropped at the retry cap into `sync_dead_letters`
    pub keep_dead_letters: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/brick-tracker.db"),
            api: ApiSettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            auth_token: None,
            timeout_secs: 30,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRY,
            interval_secs: 30,
            retry_delay_secs: 60,
            keep_dead_letters: false,
        }
    }
}

impl AppConfig {
    /// Loads the configuration; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::info!(
                "No config at {}, using defaults",
                path.to_string_lossy()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(s: &str) -> Result<Self, AppError> {
        let config: AppConfig = toml::from_str(s).map_err(|e| AppError::Config(e.to_string()))?;
        if config.sync.max_retries == 0 {
            return Err(AppError::Config(
                "sync.max_retries must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

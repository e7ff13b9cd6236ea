use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;

use crate::sync::SyncOptions;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub sync: Option<SyncDefaults>,
}

/// Defaults applied to every sync run; CLI flags override them.
#[derive(Debug, Deserialize, Default)]
pub struct SyncDefaults {
    pub max_age_minutes: Option<i64>,
    pub concurrent_syncs: Option<usize>,
    pub skip_test_connection: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub provider_priorities: Option<HashMap<String, u32>>,
}

impl AppConfig {
    pub fn sync_options(&self) -> SyncOptions {
        let mut options = SyncOptions::default();
        let Some(sync) = &self.sync else {
            return options;
        };
        if let Some(minutes) = sync.max_age_minutes {
            options.max_age = Duration::minutes(minutes);
        }
        if let Some(jobs) = sync.concurrent_syncs {
            options.concurrent_syncs = jobs;
        }
        if let Some(skip) = sync.skip_test_connection {
            options.skip_test_connection = skip;
        }
        if let Some(secs) = sync.timeout_secs {
            options.sync_timeout = Some(std::time::Duration::from_secs(secs));
        }
        if let Some(priorities) = &sync.provider_priorities {
            options.provider_priorities = priorities.clone();
        }
        options
    }
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tasksmith")
}

pub fn load_config() -> Result<AppConfig> {
    let path = config_path();
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}

use std::{path::PathBuf, time::Duration};

use crate::error::ConfigError;

pub const DATA_DIR_VAR: &str = "TASK_TIMER_DATA_DIR";
pub const TICK_MS_VAR: &str = "TASK_TIMER_TICK_MS";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_TICK_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,     // one JSON file per slot
    pub tick_interval: Duration, // Sync cadence while a task runs
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    // Defaults overridden by whatever `lookup` yields.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(raw) = lookup(TICK_MS_VAR) {
            let ms = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| ConfigError::InvalidTick {
                    var: TICK_MS_VAR,
                    value: raw.clone(),
                })?;
            config.tick_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

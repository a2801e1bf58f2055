use anyhow::{Result, anyhow};
use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;

use crate::logging::LogConfig;

pub const LOG_PATH_ENV: &str = "PASSGROUP_LOG";
pub const LOG_LEVEL_ENV: &str = "PASSGROUP_LOG_LEVEL";
pub const PASSWORD_ENV: &str = "PASSGROUP_PASSWORD";

/// Runtime settings taken from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let path = match std::env::var_os(LOG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => default_log_path()?,
        };
        let level = match std::env::var(LOG_LEVEL_ENV) {
            Ok(level) => parse_level(&level)?,
            Err(_) => LevelFilter::Info,
        };
        Ok(Self {
            log: LogConfig::new(path).with_level(level),
        })
    }
}

pub fn default_log_path() -> Result<PathBuf> {
    if let Some(home_path) = dirs_next::home_dir() {
        Ok(home_path.join(".passgroup").join("passgroup.log"))
    } else {
        Err(anyhow!("Could not determine home directory"))
    }
}

fn parse_level(value: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(value.trim())
        .map_err(|_| anyhow!("Invalid log level '{}' in {}", value, LOG_LEVEL_ENV))
}

use anyhow::{Context, Result};
use cadence_core::models::{CoreConfig, SuccessorPolicy};
use cadence_core::timezone::validate_timezone;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub const CONFIG_FILE: &str = "cadence.toml";

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// SQLite file, or `:memory:`
    pub database_path: String,
    /// Stamped on every task this CLI creates
    pub owner_id: Uuid,
    /// How long to wait for a competing writer before giving up
    pub busy_timeout_ms: u64,
    pub recurrence: RecurrenceConfig,
}

/// Settings that flow into the core's completion orchestrator
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RecurrenceConfig {
    /// IANA zone whose calendar drives recurrence
    pub timezone: String,
    pub copy_subtasks: bool,
    pub copy_tags: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            owner_id: Uuid::nil(),
            busy_timeout_ms: 5000,
            recurrence: RecurrenceConfig::default(),
        }
    }
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        let policy = SuccessorPolicy::default();
        Self {
            timezone: detect_system_timezone(),
            copy_subtasks: policy.copy_subtasks,
            copy_tags: policy.copy_tags,
        }
    }
}

impl Config {
    /// Defaults, overridden by `cadence.toml`, overridden by `CADENCE_*`
    /// variables (`CADENCE_RECURRENCE__TIMEZONE` for nested keys).
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("CADENCE_").split("__"))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn core_config(&self) -> Result<CoreConfig> {
        let timezone = validate_timezone(&self.recurrence.timezone)
            .with_context(|| format!("in [recurrence] timezone of {}", CONFIG_FILE))?;
        Ok(CoreConfig {
            timezone,
            successor: SuccessorPolicy {
                copy_subtasks: self.recurrence.copy_subtasks,
                copy_tags: self.recurrence.copy_tags,
            },
        })
    }
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    // Method 1: Check TZ environment variable
    if let Ok(tz) = std::env::var("TZ") {
        if validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    // Method 2: Try to read from /etc/timezone (Linux)
    #[cfg(target_os = "linux")]
    {
        if let Ok(tz) = std::fs::read_to_string("/etc/timezone") {
            let tz = tz.trim();
            if validate_timezone(tz).is_ok() {
                return tz.to_string();
            }
        }
    }

    // Method 3: Ask the platform
    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if validate_timezone(&local_tz).is_ok() {
            return local_tz;
        }
    }

    "UTC".to_string()
}

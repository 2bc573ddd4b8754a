use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::TimerMode;

pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1;

/// Top-level config (vtimer.toml + VTIMER_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default)]
    pub mode: TimerMode,
    /// Initial virtual time in ms. Unset means "host real time at construction".
    #[serde(default)]
    pub start_time: Option<u64>,
    #[serde(default)]
    pub live: LiveConfig,
}

/// Settings for the real-clock engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Floor for interval periods; the runtime cannot tick with a zero period.
    /// Override with env var: VTIMER_LIVE__MIN_INTERVAL_MS=5
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
        }
    }
}

fn default_min_interval_ms() -> u64 {
    DEFAULT_MIN_INTERVAL_MS
}

impl TimerConfig {
    /// Load config from a TOML file with VTIMER_* env var overrides.
    ///
    /// Uses the explicit path when given, else ~/.vtimer/vtimer.toml. A missing
    /// file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(%path, "loading timer config");

        let config: TimerConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("VTIMER_").split("__"))
            .extract()
            .map_err(|e| crate::error::TimerError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.vtimer/vtimer.toml", home)
}

//! Feed configuration
//!
//! Values-only surface consumed by the pipeline: which server and streams
//! to subscribe to, how far back to request data at startup, and the
//! scheduler's window and tick tuning. Persisted as TOML; every field has
//! a default so partial files load cleanly.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};
use crate::scheduler::SchedulerConfig;
use crate::source::StreamSubscription;
use crate::types::DEFAULT_WINDOW_SECS;

/// Configuration for one feed pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Server address with port, e.g. `rtserver.ipgp.fr:18000`
    pub server: String,

    /// Multiselect stream string, e.g. `"IU_KONO:BHE BHN,MN_AQU:HH?.D"`
    pub streams: String,

    /// How far back to request data from the source at startup, seconds
    pub backtrace_secs: f64,

    /// Trailing display window per channel, seconds
    pub window_secs: f64,

    /// Scheduler tick interval, milliseconds
    pub tick_interval_ms: u64,

    /// Re-merge and re-publish on ticks where no new data arrived
    pub remerge_unchanged: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            server: "localhost:18000".to_string(),
            streams: "IU_KONO:BHE BHN".to_string(),
            backtrace_secs: 3600.0,
            window_secs: DEFAULT_WINDOW_SECS,
            tick_interval_ms: 10,
            remerge_unchanged: false,
        }
    }
}

impl FeedConfig {
    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: FeedConfig = toml::from_str(&contents)
            .map_err(|e| FeedError::Serialization(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| FeedError::Serialization(e.to_string()))?;
        std::fs::write(path.as_ref(), contents)?;
        Ok(())
    }

    /// Check value ranges and the stream selector syntax
    pub fn validate(&self) -> Result<()> {
        if self.window_secs <= 0.0 {
            return Err(FeedError::Config(
                "window_secs must be positive".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(FeedError::Config(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.backtrace_secs < 0.0 {
            return Err(FeedError::Config(
                "backtrace_secs must not be negative".to_string(),
            ));
        }
        StreamSubscription::parse_multiselect(&self.streams)?;
        Ok(())
    }

    /// Parsed subscription groups from [`streams`](Self::streams)
    pub fn subscriptions(&self) -> Result<Vec<StreamSubscription>> {
        StreamSubscription::parse_multiselect(&self.streams)
    }

    /// Scheduler tick interval as a `Duration`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Scheduler tuning derived from this configuration
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: self.tick_interval(),
            window_secs: self.window_secs,
            remerge_unchanged: self.remerge_unchanged,
        }
    }
}

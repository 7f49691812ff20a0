//! Idle connection reaper settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigDefaults;

/// How often the reaper sweeps and what it closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Pause between two sweeps
    pub sweep_interval: Duration,

    /// Idle connections unused for longer than this are closed
    pub idle_ttl: Duration,

    /// Idle connections opened longer ago than this are closed; `None` keeps them
    pub max_connection_age: Option<Duration>,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: ConfigDefaults::SWEEP_INTERVAL,
            idle_ttl: ConfigDefaults::IDLE_TTL,
            max_connection_age: Some(ConfigDefaults::MAX_CONNECTION_AGE),
        }
    }
}

impl ReaperConfig {
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_max_connection_age(mut self, age: Option<Duration>) -> Self {
        self.max_connection_age = age;
        self
    }
}

//! Configuration validation
//!
//! Checked once per build, before any runtime, pool or thread exists.

use http::HeaderValue;

use super::Config;
use crate::error::ConfigError;

impl Config {
    /// Validates the configuration for correctness and consistency
    ///
    /// # Errors
    ///
    /// - `Invalid` - a cap, thread count or interval is zero, the user agent is
    ///   not a valid header value, or the proxy address is incomplete
    /// - `Conflict` - the per-route cap exceeds the total cap
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections_total == 0 {
            return Err(ConfigError::Invalid(
                "max_connections_total must be greater than zero".to_string(),
            ));
        }
        if self.max_connections_per_route == 0 {
            return Err(ConfigError::Invalid(
                "max_connections_per_route must be greater than zero".to_string(),
            ));
        }
        if self.max_connections_per_route > self.max_connections_total {
            return Err(ConfigError::Conflict(format!(
                "max_connections_per_route ({}) exceeds max_connections_total ({})",
                self.max_connections_per_route, self.max_connections_total
            )));
        }
        if self.io_threads == 0 {
            return Err(ConfigError::Invalid(
                "io_threads must be greater than zero".to_string(),
            ));
        }
        if self.reaper.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "reaper sweep interval cannot be zero".to_string(),
            ));
        }
        if HeaderValue::from_str(&self.user_agent).is_err() {
            return Err(ConfigError::Invalid(format!(
                "user agent {:?} is not a valid header value",
                self.user_agent
            )));
        }
        if let Some(proxy) = &self.proxy
            && (proxy.host.is_empty() || proxy.port == 0)
        {
            return Err(ConfigError::Invalid(format!("incomplete proxy address {proxy}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::ReaperConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn per_route_above_total_is_a_conflict() {
        let config = Config::default()
            .with_max_connections(4)
            .with_max_connections_per_route(5);
        assert!(matches!(config.validate(), Err(ConfigError::Conflict(_))));
    }

    #[test]
    fn zero_caps_are_rejected() {
        let config = Config::default().with_max_connections(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config::default().with_max_connections_per_route(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let config = Config::default()
            .with_reaper(ReaperConfig::default().with_sweep_interval(Duration::ZERO));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn negative_millis_mean_unbounded() {
        let config = Config::default()
            .with_connection_timeout_ms(-1)
            .with_socket_timeout_ms(1500);
        assert_eq!(config.connection_timeout, None);
        assert_eq!(config.socket_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.pool_wait_timeout(), config.pool_wait_cap);
    }

    #[test]
    fn bad_user_agent_is_rejected() {
        let config = Config::default().with_user_agent("bad\nagent");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}

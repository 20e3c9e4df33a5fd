//! Runtime configuration for the poll loop.
//!
//! # Design
//! - Every field has a default so partial documents load cleanly.
//! - Validation happens once, before the loop starts; the worker trusts the values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Refresh interval used until the engine advertises its own.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1_500;
/// Lower bound applied to engine-advertised intervals.
pub const DEFAULT_MIN_REFRESH_INTERVAL_MS: u64 = 500;
/// Samples kept for the transfer-speed graph.
pub const DEFAULT_SPEED_HISTORY_CAPACITY: usize = 300;
/// Queue depth for handle-to-worker commands.
pub const DEFAULT_COMMAND_BUFFER: usize = 32;
/// Queue depth for change-event subscribers.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Poll loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Interval between polls, in milliseconds.
    pub refresh_interval_ms: u64,
    /// Smallest interval accepted from the engine, in milliseconds.
    pub min_refresh_interval_ms: u64,
    /// Bounded length of the speed history.
    pub speed_history_capacity: usize,
    /// Command channel capacity.
    pub command_buffer: usize,
    /// Change-event broadcast capacity.
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            min_refresh_interval_ms: DEFAULT_MIN_REFRESH_INTERVAL_MS,
            speed_history_capacity: DEFAULT_SPEED_HISTORY_CAPACITY,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl SyncConfig {
    /// Parse a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::InvalidField`] when validation fails.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the worker relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(invalid("refresh_interval_ms", self.refresh_interval_ms, "must be positive"));
        }
        if self.min_refresh_interval_ms == 0 {
            return Err(invalid(
                "min_refresh_interval_ms",
                self.min_refresh_interval_ms,
                "must be positive",
            ));
        }
        if self.min_refresh_interval_ms > self.refresh_interval_ms {
            return Err(invalid(
                "min_refresh_interval_ms",
                self.min_refresh_interval_ms,
                "must not exceed refresh_interval_ms",
            ));
        }
        if self.speed_history_capacity == 0 {
            return Err(invalid("speed_history_capacity", 0, "must be positive"));
        }
        if self.command_buffer == 0 {
            return Err(invalid("command_buffer", 0, "must be positive"));
        }
        if self.event_buffer == 0 {
            return Err(invalid("event_buffer", 0, "must be positive"));
        }
        Ok(())
    }

    /// Configured poll interval.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Clamp an engine-advertised interval to the configured floor.
    #[must_use]
    pub fn clamp_interval(&self, advertised_ms: u64) -> Duration {
        Duration::from_millis(advertised_ms.max(self.min_refresh_interval_ms))
    }
}

fn invalid(field: &'static str, value: impl ToString, reason: &'static str) -> ConfigError {
    ConfigError::InvalidField {
        field,
        value: value.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.refresh_interval(), Duration::from_millis(1_500));
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let config = SyncConfig::from_json_str(r#"{"refresh_interval_ms": 2000}"#).unwrap();
        assert_eq!(config.refresh_interval_ms, 2_000);
        assert_eq!(config.speed_history_capacity, DEFAULT_SPEED_HISTORY_CAPACITY);
    }

    #[test]
    fn rejects_floor_above_interval() {
        let err = SyncConfig::from_json_str(
            r#"{"refresh_interval_ms": 400, "min_refresh_interval_ms": 500}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "min_refresh_interval_ms",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            SyncConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn clamps_advertised_intervals() {
        let config = SyncConfig::default();
        assert_eq!(config.clamp_interval(100), Duration::from_millis(500));
        assert_eq!(config.clamp_interval(3_000), Duration::from_millis(3_000));
    }
}

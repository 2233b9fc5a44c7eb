//! Time tree defaults.
//!
//! # Responsibility
//! - Hold the resolution and time zone used when a caller omits them.
//! - Keep a serde shape a host application can embed in its own config file.
//!
//! # Invariants
//! - `default_resolution` is never `Granularity::Root`.

use crate::model::granularity::Granularity;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from config validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The default resolution must name a calendar level below the root.
    InvalidDefaultResolution(Granularity),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDefaultResolution(granularity) => write!(
                f,
                "default resolution must be year or finer, got `{granularity}`"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Defaults applied by `TimeTree` when a call omits resolution or time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeTreeConfig {
    pub default_resolution: Granularity,
    pub default_time_zone: Tz,
}

impl Default for TimeTreeConfig {
    fn default() -> Self {
        Self {
            default_resolution: Granularity::Day,
            default_time_zone: Tz::UTC,
        }
    }
}

impl TimeTreeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_resolution == Granularity::Root {
            return Err(ConfigError::InvalidDefaultResolution(
                self.default_resolution,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, TimeTreeConfig};
    use crate::model::granularity::Granularity;
    use chrono_tz::Tz;

    #[test]
    fn defaults_are_day_and_utc() {
        let config = TimeTreeConfig::default();
        assert_eq!(config.default_resolution, Granularity::Day);
        assert_eq!(config.default_time_zone, Tz::UTC);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn root_resolution_is_rejected() {
        let config = TimeTreeConfig {
            default_resolution: Granularity::Root,
            ..TimeTreeConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidDefaultResolution(Granularity::Root))
        );
    }

    #[test]
    fn deserializes_partial_config() {
        let config: TimeTreeConfig =
            serde_json::from_str(r#"{"default_time_zone":"Europe/Prague"}"#).unwrap();
        assert_eq!(config.default_resolution, Granularity::Day);
        assert_eq!(config.default_time_zone, chrono_tz::Europe::Prague);

        let config: TimeTreeConfig =
            serde_json::from_str(r#"{"default_resolution":"minute"}"#).unwrap();
        assert_eq!(config.default_resolution, Granularity::Minute);
        assert_eq!(config.default_time_zone, Tz::UTC);
    }

    #[test]
    fn serializes_with_snake_case_granularity_and_zone_name() {
        let json = serde_json::to_value(TimeTreeConfig::default()).unwrap();
        assert_eq!(json["default_resolution"], "day");
        assert_eq!(json["default_time_zone"], "UTC");
    }
}

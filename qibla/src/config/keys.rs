//! `section.key` addressing for configuration values.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ConfigFile};
use crate::geo::{MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};
use crate::logging::LogLevel;

/// Every editable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    TargetLatitude,
    TargetLongitude,

    CompassFilterCapacity,
    CompassForcedCalibrationSecs,
    CompassAlignmentTolerance,
    CompassObserverEpsilonKm,

    CalibrationWindowMs,
    CalibrationCheckIntervalMs,
    CalibrationMinSamples,
    CalibrationRangeThreshold,
    CalibrationRequiredEvents,

    DeclinationEnabled,
    DeclinationEndpoint,
    DeclinationApiKey,
    DeclinationTimeoutSecs,
    DeclinationCacheToleranceKm,

    LoggingLevel,
    LoggingFile,
}

const ALL_KEYS: &[ConfigKey] = &[
    ConfigKey::TargetLatitude,
    ConfigKey::TargetLongitude,
    ConfigKey::CompassFilterCapacity,
    ConfigKey::CompassForcedCalibrationSecs,
    ConfigKey::CompassAlignmentTolerance,
    ConfigKey::CompassObserverEpsilonKm,
    ConfigKey::CalibrationWindowMs,
    ConfigKey::CalibrationCheckIntervalMs,
    ConfigKey::CalibrationMinSamples,
    ConfigKey::CalibrationRangeThreshold,
    ConfigKey::CalibrationRequiredEvents,
    ConfigKey::DeclinationEnabled,
    ConfigKey::DeclinationEndpoint,
    ConfigKey::DeclinationApiKey,
    ConfigKey::DeclinationTimeoutSecs,
    ConfigKey::DeclinationCacheToleranceKm,
    ConfigKey::LoggingLevel,
    ConfigKey::LoggingFile,
];

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        ALL_KEYS
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::TargetLatitude => "target.latitude",
            ConfigKey::TargetLongitude => "target.longitude",
            ConfigKey::CompassFilterCapacity => "compass.filter_capacity",
            ConfigKey::CompassForcedCalibrationSecs => "compass.forced_calibration_secs",
            ConfigKey::CompassAlignmentTolerance => "compass.alignment_tolerance",
            ConfigKey::CompassObserverEpsilonKm => "compass.observer_epsilon_km",
            ConfigKey::CalibrationWindowMs => "calibration.window_ms",
            ConfigKey::CalibrationCheckIntervalMs => "calibration.check_interval_ms",
            ConfigKey::CalibrationMinSamples => "calibration.min_samples",
            ConfigKey::CalibrationRangeThreshold => "calibration.range_threshold",
            ConfigKey::CalibrationRequiredEvents => "calibration.required_events",
            ConfigKey::DeclinationEnabled => "declination.enabled",
            ConfigKey::DeclinationEndpoint => "declination.endpoint",
            ConfigKey::DeclinationApiKey => "declination.api_key",
            ConfigKey::DeclinationTimeoutSecs => "declination.timeout_secs",
            ConfigKey::DeclinationCacheToleranceKm => "declination.cache_tolerance_km",
            ConfigKey::LoggingLevel => "logging.level",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    pub fn section(&self) -> &'static str {
        self.split().0
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        self.split().1
    }

    fn split(&self) -> (&'static str, &'static str) {
        let name = self.name();
        name.split_once('.').unwrap_or((name, ""))
    }

    /// Current value as written to the file. Unset optional values are empty.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::TargetLatitude => config.target.latitude.to_string(),
            ConfigKey::TargetLongitude => config.target.longitude.to_string(),
            ConfigKey::CompassFilterCapacity => config.compass.filter_capacity.to_string(),
            ConfigKey::CompassForcedCalibrationSecs => {
                config.compass.forced_calibration_secs.to_string()
            }
            ConfigKey::CompassAlignmentTolerance => config.compass.alignment_tolerance.to_string(),
            ConfigKey::CompassObserverEpsilonKm => config.compass.observer_epsilon_km.to_string(),
            ConfigKey::CalibrationWindowMs => config.calibration.window_ms.to_string(),
            ConfigKey::CalibrationCheckIntervalMs => {
                config.calibration.check_interval_ms.to_string()
            }
            ConfigKey::CalibrationMinSamples => config.calibration.min_samples.to_string(),
            ConfigKey::CalibrationRangeThreshold => config.calibration.range_threshold.to_string(),
            ConfigKey::CalibrationRequiredEvents => config.calibration.required_events.to_string(),
            ConfigKey::DeclinationEnabled => config.declination.enabled.to_string(),
            ConfigKey::DeclinationEndpoint => config.declination.endpoint.clone(),
            ConfigKey::DeclinationApiKey => config.declination.api_key.clone(),
            ConfigKey::DeclinationTimeoutSecs => config.declination.timeout_secs.to_string(),
            ConfigKey::DeclinationCacheToleranceKm => {
                config.declination.cache_tolerance_km.to_string()
            }
            ConfigKey::LoggingLevel => config.logging.level.to_string(),
            ConfigKey::LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validates and stores a value.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::TargetLatitude => {
                config.target.latitude = self.parse_f64_in(value, MIN_LAT, MAX_LAT)?
            }
            ConfigKey::TargetLongitude => {
                config.target.longitude = self.parse_f64_in(value, MIN_LON, MAX_LON)?
            }
            ConfigKey::CompassFilterCapacity => {
                config.compass.filter_capacity = self.parse_at_least(value, 1)? as usize
            }
            ConfigKey::CompassForcedCalibrationSecs => {
                config.compass.forced_calibration_secs = self.parse_at_least(value, 1)?
            }
            ConfigKey::CompassAlignmentTolerance => {
                config.compass.alignment_tolerance = self.parse_f64_in(value, 0.0, 180.0)?
            }
            ConfigKey::CompassObserverEpsilonKm => {
                config.compass.observer_epsilon_km = self.parse_f64_in(value, 0.0, f64::MAX)?
            }
            ConfigKey::CalibrationWindowMs => {
                config.calibration.window_ms = self.parse_at_least(value, 1)?
            }
            ConfigKey::CalibrationCheckIntervalMs => {
                config.calibration.check_interval_ms = self.parse_at_least(value, 1)?
            }
            ConfigKey::CalibrationMinSamples => {
                config.calibration.min_samples = self.parse_at_least(value, 1)? as usize
            }
            ConfigKey::CalibrationRangeThreshold => {
                config.calibration.range_threshold = self.parse_f64_in(value, 0.0, 180.0)?
            }
            ConfigKey::CalibrationRequiredEvents => {
                let events = self.parse_at_least(value, 1)?;
                config.calibration.required_events =
                    u32::try_from(events).map_err(|_| self.invalid(value, "too large"))?;
            }
            ConfigKey::DeclinationEnabled => config.declination.enabled = self.parse_bool(value)?,
            ConfigKey::DeclinationEndpoint => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(self.invalid(value, "must be an http(s) URL"));
                }
                config.declination.endpoint = value.to_string();
            }
            ConfigKey::DeclinationApiKey => {
                if value.is_empty() {
                    return Err(self.invalid(value, "must not be empty"));
                }
                config.declination.api_key = value.to_string();
            }
            ConfigKey::DeclinationTimeoutSecs => {
                config.declination.timeout_secs = self.parse_at_least(value, 1)?
            }
            ConfigKey::DeclinationCacheToleranceKm => {
                config.declination.cache_tolerance_km = self.parse_f64_in(value, 0.0, f64::MAX)?
            }
            ConfigKey::LoggingLevel => {
                config.logging.level = value
                    .parse::<LogLevel>()
                    .map_err(|e| self.invalid(value, &e.to_string()))?
            }
            ConfigKey::LoggingFile => {
                config.logging.file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse_f64_in(&self, value: &str, min: f64, max: f64) -> Result<f64, ConfigError> {
        let parsed: f64 = value
            .parse()
            .map_err(|_| self.invalid(value, "not a number"))?;
        if !parsed.is_finite() || parsed < min || parsed > max {
            return Err(self.invalid(value, &format!("must be between {} and {}", min, max)));
        }
        Ok(parsed)
    }

    fn parse_at_least(&self, value: &str, min: u64) -> Result<u64, ConfigError> {
        let parsed: u64 = value
            .parse()
            .map_err(|_| self.invalid(value, "not a whole number"))?;
        if parsed < min {
            return Err(self.invalid(value, &format!("must be at least {}", min)));
        }
        Ok(parsed)
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

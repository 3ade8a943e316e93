//! INI configuration file.
//!
//! Settings live in `~/.qibla/config.ini`. A missing file means defaults;
//! keys that are absent from the file keep their default value.
//!
//! ```ini
//! [target]
//! latitude = 21.422487
//! longitude = 39.826206
//!
//! [compass]
//! filter_capacity = 5
//! forced_calibration_secs = 12
//! alignment_tolerance = 10
//! observer_epsilon_km = 0.1
//!
//! [calibration]
//! window_ms = 10000
//! check_interval_ms = 2000
//! min_samples = 20
//! range_threshold = 120
//! required_events = 3
//!
//! [declination]
//! enabled = true
//! endpoint = https://www.ngdc.noaa.gov/geomag-web/calculators/calculateDeclination
//! api_key = zNEw7
//! timeout_secs = 5
//! cache_tolerance_km = 0.1
//!
//! [logging]
//! level = info
//! file =
//! ```
//!
//! Every setting is addressable as `section.key` through [`ConfigKey`].

mod keys;

pub use keys::ConfigKey;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::declination::{DeclinationConfig, NOAA_ENDPOINT, NOAA_PUBLIC_KEY};
use crate::geo::{GeoError, GeoPoint, KAABA};
use crate::heading::{CalibrationConfig, DEFAULT_FILTER_CAPACITY};
use crate::logging::{LogLevel, LoggingConfig};
use crate::session::{
    SessionConfig, DEFAULT_ALIGNMENT_TOLERANCE_DEG, DEFAULT_FORCED_CALIBRATION_TIMEOUT,
    DEFAULT_OBSERVER_EPSILON_KM,
};

const CONFIG_DIR_NAME: &str = ".qibla";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors reading, writing, or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid target location: {0}")]
    InvalidTarget(#[from] GeoError),
}

/// `~/.qibla`, or `./.qibla` when there's no home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// `[target]`
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSettings {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            latitude: KAABA.latitude,
            longitude: KAABA.longitude,
        }
    }
}

/// `[compass]`
#[derive(Debug, Clone, PartialEq)]
pub struct CompassSettings {
    pub filter_capacity: usize,
    pub forced_calibration_secs: u64,
    pub alignment_tolerance: f64,
    pub observer_epsilon_km: f64,
}

impl Default for CompassSettings {
    fn default() -> Self {
        Self {
            filter_capacity: DEFAULT_FILTER_CAPACITY,
            forced_calibration_secs: DEFAULT_FORCED_CALIBRATION_TIMEOUT.as_secs(),
            alignment_tolerance: DEFAULT_ALIGNMENT_TOLERANCE_DEG,
            observer_epsilon_km: DEFAULT_OBSERVER_EPSILON_KM,
        }
    }
}

/// `[calibration]`
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSettings {
    pub window_ms: u64,
    pub check_interval_ms: u64,
    pub min_samples: usize,
    pub range_threshold: f64,
    pub required_events: u32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        let defaults = CalibrationConfig::default();
        Self {
            window_ms: defaults.window.as_millis() as u64,
            check_interval_ms: defaults.check_interval.as_millis() as u64,
            min_samples: defaults.min_samples,
            range_threshold: defaults.range_threshold_deg,
            required_events: defaults.required_events,
        }
    }
}

/// `[declination]`
#[derive(Debug, Clone, PartialEq)]
pub struct DeclinationSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub cache_tolerance_km: f64,
}

impl Default for DeclinationSettings {
    fn default() -> Self {
        let defaults = DeclinationConfig::default();
        Self {
            enabled: defaults.enabled,
            endpoint: NOAA_ENDPOINT.to_string(),
            api_key: NOAA_PUBLIC_KEY.to_string(),
            timeout_secs: defaults.timeout.as_secs(),
            cache_tolerance_km: defaults.cache_tolerance_km,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
}

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub target: TargetSettings,
    pub compass: CompassSettings,
    pub calibration: CalibrationSettings,
    pub declination: DeclinationSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Loads from [`config_file_path`]; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parses INI text. Unknown keys are logged and ignored.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;

        let mut config = Self::default();

        for (section, properties) in ini.iter() {
            let Some(section) = section else {
                continue;
            };
            for (key, value) in properties.iter() {
                let name = format!("{}.{}", section, key);
                match name.parse::<ConfigKey>() {
                    Ok(config_key) => config_key.set(&mut config, value)?,
                    Err(_) => tracing::warn!(key = %name, "Ignoring unknown configuration key"),
                }
            }
        }

        Ok(config)
    }

    /// Writes to [`config_file_path`], creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        self.to_ini().write_to_file(path).map_err(io_err)?;

        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Renders every key, including defaults.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// The configured target location.
    pub fn target_point(&self) -> Result<GeoPoint, ConfigError> {
        Ok(GeoPoint::new(self.target.latitude, self.target.longitude)?)
    }

    pub fn calibration_config(&self) -> CalibrationConfig {
        CalibrationConfig {
            window: Duration::from_millis(self.calibration.window_ms),
            check_interval: Duration::from_millis(self.calibration.check_interval_ms),
            min_samples: self.calibration.min_samples,
            range_threshold_deg: self.calibration.range_threshold,
            required_events: self.calibration.required_events,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            filter_capacity: self.compass.filter_capacity,
            calibration: self.calibration_config(),
            forced_calibration_timeout: Duration::from_secs(self.compass.forced_calibration_secs),
            alignment_tolerance_deg: self.compass.alignment_tolerance,
            observer_epsilon_km: self.compass.observer_epsilon_km,
        }
    }

    pub fn declination_config(&self) -> DeclinationConfig {
        DeclinationConfig {
            enabled: self.declination.enabled,
            endpoint: self.declination.endpoint.clone(),
            api_key: self.declination.api_key.clone(),
            timeout: Duration::from_secs(self.declination.timeout_secs),
            cache_tolerance_km: self.declination.cache_tolerance_km,
            reference_year: None,
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level,
            file: self.logging.file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_runtime_configs() {
        let config = ConfigFile::default();
        assert_eq!(config.session_config(), SessionConfig::default());
        assert_eq!(config.declination_config(), DeclinationConfig::default());
        assert_eq!(config.logging_config(), LoggingConfig::default());
        assert_eq!(config.target_point().unwrap(), KAABA);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = ConfigFile::parse(
            "[compass]\nfilter_capacity = 8\n\n[declination]\nenabled = false\n",
        )
        .unwrap();

        assert_eq!(config.compass.filter_capacity, 8);
        assert!(!config.declination.enabled);
        // Untouched keys keep their defaults
        assert_eq!(config.compass.forced_calibration_secs, 12);
        assert_eq!(config.calibration, CalibrationSettings::default());
    }

    #[test]
    fn test_parse_ignores_unknown_keys() {
        let config = ConfigFile::parse("[compass]\ncolour = red\n[extras]\nfoo = bar\n").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_parse_rejects_invalid_value() {
        let result = ConfigFile::parse("[target]\nlatitude = 123\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.target.latitude = 31.7767;
        config.target.longitude = 35.2345;
        config.compass.alignment_tolerance = 5.0;
        config.logging.level = LogLevel::Debug;
        config.logging.file = Some(PathBuf::from("/tmp/qibla.log"));
        config.save_to(&path).unwrap();

        let reloaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_session_config_conversion() {
        let mut config = ConfigFile::default();
        config.compass.forced_calibration_secs = 30;
        config.calibration.window_ms = 5_000;
        config.calibration.required_events = 2;

        let session = config.session_config();
        assert_eq!(session.forced_calibration_timeout, Duration::from_secs(30));
        assert_eq!(session.calibration.window, Duration::from_secs(5));
        assert_eq!(session.calibration.required_events, 2);
    }

    #[test]
    fn test_config_file_path() {
        let path = config_file_path();
        assert!(path.ends_with(".qibla/config.ini"));
    }
}

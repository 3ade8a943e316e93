//! Heading session: lifecycle, fusion, and publication.
//!
//! A session ties the pieces together for one observer and target:
//!
//! - [`HeadingSession`] - synchronous state machine; classifies events,
//!   smooths, tracks calibration, applies declination, derives labels
//! - [`OrientationPlatform`] - seam to the host's orientation sensor
//! - [`ForcedCalibrationTimer`] - cancellable deadline after recalibration
//! - [`spawn_session`] / [`SessionHandle`] - async runner that drives a
//!   session from a platform event stream
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qibla::declination::{AsyncReqwestClient, DeclinationConfig, DeclinationProvider};
//! use qibla::geo::{GeoPoint, KAABA};
//! use qibla::session::{spawn_session, ChannelPlatform, OrientationEvent, SessionConfig};
//!
//! let (platform, events) = ChannelPlatform::new(64);
//! let provider = Arc::new(DeclinationProvider::new(
//!     AsyncReqwestClient::new()?,
//!     DeclinationConfig::default(),
//! ));
//! let (handle, task) = spawn_session(
//!     SessionConfig::default(),
//!     platform,
//!     provider,
//!     GeoPoint::new(51.5074, -0.1278)?,
//!     KAABA,
//! )?;
//!
//! events.send(OrientationEvent::compass(112.0)).await?;
//! println!("{:?}", handle.state().relative_bearing);
//! handle.stop();
//! let final_state = task.await?;
//! ```

mod machine;
mod platform;
mod runner;
mod state;
mod timer;

pub use machine::HeadingSession;
pub use platform::{
    ChannelPlatform, OrientationCapability, OrientationEvent, OrientationPlatform,
    ParseEventError, PermissionOutcome,
};
pub use runner::{spawn_session, SessionCommand, SessionHandle};
pub use state::{AccuracyLabel, LifecyclePhase, SessionState, UnavailableReason};
pub use timer::ForcedCalibrationTimer;

use std::time::Duration;

use thiserror::Error;

use crate::geo::GeoError;
use crate::heading::{CalibrationConfig, DEFAULT_FILTER_CAPACITY};

/// Deadline after a recalibration before calibration is forced.
pub const DEFAULT_FORCED_CALIBRATION_TIMEOUT: Duration = Duration::from_secs(12);

/// Relative bearing (either side of 0°) that counts as facing the target.
pub const DEFAULT_ALIGNMENT_TOLERANCE_DEG: f64 = 10.0;

/// Observer moves shorter than this are ignored.
pub const DEFAULT_OBSERVER_EPSILON_KM: f64 = 0.1;

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: LifecyclePhase,
    },

    #[error("Invalid location: {0}")]
    InvalidLocation(#[from] GeoError),
}

/// Tuning for a [`HeadingSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Samples averaged by the heading filter.
    pub filter_capacity: usize,
    pub calibration: CalibrationConfig,
    pub forced_calibration_timeout: Duration,
    pub alignment_tolerance_deg: f64,
    /// Also used to match declination records to the observer.
    pub observer_epsilon_km: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            filter_capacity: DEFAULT_FILTER_CAPACITY,
            calibration: CalibrationConfig::default(),
            forced_calibration_timeout: DEFAULT_FORCED_CALIBRATION_TIMEOUT,
            alignment_tolerance_deg: DEFAULT_ALIGNMENT_TOLERANCE_DEG,
            observer_epsilon_km: DEFAULT_OBSERVER_EPSILON_KM,
        }
    }
}

impl SessionConfig {
    pub fn with_filter_capacity(mut self, capacity: usize) -> Self {
        self.filter_capacity = capacity;
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_forced_calibration_timeout(mut self, timeout: Duration) -> Self {
        self.forced_calibration_timeout = timeout;
        self
    }

    pub fn with_alignment_tolerance(mut self, degrees: f64) -> Self {
        self.alignment_tolerance_deg = degrees;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.filter_capacity, 5);
        assert_eq!(config.forced_calibration_timeout, Duration::from_secs(12));
        assert_eq!(config.alignment_tolerance_deg, 10.0);
        assert_eq!(config.observer_epsilon_km, 0.1);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::default()
            .with_filter_capacity(8)
            .with_forced_calibration_timeout(Duration::from_secs(3))
            .with_alignment_tolerance(5.0);
        assert_eq!(config.filter_capacity, 8);
        assert_eq!(config.forced_calibration_timeout, Duration::from_secs(3));
        assert_eq!(config.alignment_tolerance_deg, 5.0);
    }

    #[test]
    fn test_error_display() {
        let err = SessionError::InvalidTransition {
            action: "recalibrate",
            phase: LifecyclePhase::Idle,
        };
        assert_eq!(err.to_string(), "Cannot recalibrate while idle");
    }
}

//! Published session state and its derived labels.

use std::fmt;

use serde::Serialize;

use crate::declination::DeclinationRecord;
use crate::heading::HeadingSource;

/// Why a session can't produce readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The platform has no orientation capability at all.
    NotSupported,
    /// The platform requires consent and it was refused.
    PermissionDenied,
    /// The permission request or sensor stream failed.
    Error,
}

/// Lifecycle of a [`HeadingSession`](super::HeadingSession).
///
/// ```text
/// Idle → RequestingPermission → Listening → Stopped
///   │            │                  │
///   └────────────┴──────────────────┴──→ Unavailable(reason)
/// ```
///
/// `Stopped` and `Unavailable` are terminal; retrying means starting a new
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Idle,
    RequestingPermission,
    Listening,
    Stopped,
    Unavailable(UnavailableReason),
}

impl LifecyclePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecyclePhase::Stopped | LifecyclePhase::Unavailable(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Idle => "idle",
            LifecyclePhase::RequestingPermission => "requesting-permission",
            LifecyclePhase::Listening => "listening",
            LifecyclePhase::Stopped => "stopped",
            LifecyclePhase::Unavailable(UnavailableReason::NotSupported) => "unavailable (not supported)",
            LifecyclePhase::Unavailable(UnavailableReason::PermissionDenied) => {
                "unavailable (permission denied)"
            }
            LifecyclePhase::Unavailable(UnavailableReason::Error) => "unavailable (error)",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How far the current reading can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccuracyLabel {
    #[serde(rename = "High (platform-absolute)")]
    PlatformAbsolute,
    #[serde(rename = "High (absolute)")]
    Absolute,
    #[serde(rename = "Good (relative)")]
    Relative,
    #[serde(rename = "Low (needs calibration)")]
    NeedsCalibration,
    /// Listening, but no valid sample yet.
    #[serde(rename = "Initializing")]
    Initializing,
    #[serde(rename = "Permission Denied")]
    PermissionDenied,
    #[serde(rename = "Not Supported")]
    NotSupported,
    #[serde(rename = "Error")]
    Error,
}

impl AccuracyLabel {
    /// Derives the label from lifecycle and sample state.
    ///
    /// Lifecycle failures take priority, then the sample source, then
    /// calibration.
    pub fn derive(
        phase: LifecyclePhase,
        source: Option<HeadingSource>,
        is_absolute: bool,
        is_calibrated: bool,
    ) -> Self {
        match phase {
            LifecyclePhase::Unavailable(UnavailableReason::NotSupported) => {
                AccuracyLabel::NotSupported
            }
            LifecyclePhase::Unavailable(UnavailableReason::PermissionDenied) => {
                AccuracyLabel::PermissionDenied
            }
            LifecyclePhase::Unavailable(UnavailableReason::Error) => AccuracyLabel::Error,
            LifecyclePhase::Idle | LifecyclePhase::RequestingPermission => {
                AccuracyLabel::Initializing
            }
            LifecyclePhase::Listening | LifecyclePhase::Stopped => match source {
                None => AccuracyLabel::Initializing,
                Some(HeadingSource::NativeCompass) => AccuracyLabel::PlatformAbsolute,
                Some(HeadingSource::Orientation) if is_absolute && is_calibrated => {
                    AccuracyLabel::Absolute
                }
                Some(HeadingSource::Orientation) if is_calibrated => AccuracyLabel::Relative,
                Some(HeadingSource::Orientation) => AccuracyLabel::NeedsCalibration,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccuracyLabel::PlatformAbsolute => "High (platform-absolute)",
            AccuracyLabel::Absolute => "High (absolute)",
            AccuracyLabel::Relative => "Good (relative)",
            AccuracyLabel::NeedsCalibration => "Low (needs calibration)",
            AccuracyLabel::Initializing => "Initializing",
            AccuracyLabel::PermissionDenied => "Permission Denied",
            AccuracyLabel::NotSupported => "Not Supported",
            AccuracyLabel::Error => "Error",
        }
    }

    /// Whether a reading is available at all.
    pub fn has_reading(&self) -> bool {
        matches!(
            self,
            AccuracyLabel::PlatformAbsolute
                | AccuracyLabel::Absolute
                | AccuracyLabel::Relative
                | AccuracyLabel::NeedsCalibration
        )
    }
}

impl fmt::Display for AccuracyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a presentation layer needs, published after each change.
///
/// Heading fields are `None` until the first valid sample; bearing and
/// distance are `None` until the session has started.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub phase: LifecyclePhase,
    pub accuracy: AccuracyLabel,
    pub calibrated: bool,
    /// Circular mean of recent magnetic headings.
    pub smoothed_heading: Option<f64>,
    /// Smoothed heading corrected for declination.
    pub true_heading: Option<f64>,
    /// Angle from the device heading to the target, clockwise.
    pub relative_bearing: Option<f64>,
    /// Great-circle bearing from observer to target.
    pub target_bearing: Option<f64>,
    pub distance_km: Option<f64>,
    pub declination: Option<DeclinationRecord>,
    /// Relative bearing is within the alignment tolerance of 0°.
    pub aligned: bool,
    pub source: Option<HeadingSource>,
    pub last_sample_at_ms: Option<u64>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: LifecyclePhase::Idle,
            accuracy: AccuracyLabel::Initializing,
            calibrated: false,
            smoothed_heading: None,
            true_heading: None,
            relative_bearing: None,
            target_bearing: None,
            distance_km: None,
            declination: None,
            aligned: false,
            source: None,
            last_sample_at_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_overrides_win() {
        let source = Some(HeadingSource::NativeCompass);
        assert_eq!(
            AccuracyLabel::derive(
                LifecyclePhase::Unavailable(UnavailableReason::PermissionDenied),
                source,
                true,
                true
            ),
            AccuracyLabel::PermissionDenied
        );
        assert_eq!(
            AccuracyLabel::derive(
                LifecyclePhase::Unavailable(UnavailableReason::NotSupported),
                None,
                false,
                false
            ),
            AccuracyLabel::NotSupported
        );
        assert_eq!(
            AccuracyLabel::derive(
                LifecyclePhase::Unavailable(UnavailableReason::Error),
                source,
                true,
                true
            ),
            AccuracyLabel::Error
        );
    }

    #[test]
    fn test_native_compass_trusted_without_calibration() {
        assert_eq!(
            AccuracyLabel::derive(
                LifecyclePhase::Listening,
                Some(HeadingSource::NativeCompass),
                true,
                false
            ),
            AccuracyLabel::PlatformAbsolute
        );
    }

    #[test]
    fn test_orientation_labels() {
        let listening = LifecyclePhase::Listening;
        let orientation = Some(HeadingSource::Orientation);
        assert_eq!(
            AccuracyLabel::derive(listening, orientation, true, true),
            AccuracyLabel::Absolute
        );
        assert_eq!(
            AccuracyLabel::derive(listening, orientation, false, true),
            AccuracyLabel::Relative
        );
        assert_eq!(
            AccuracyLabel::derive(listening, orientation, true, false),
            AccuracyLabel::NeedsCalibration
        );
        assert_eq!(
            AccuracyLabel::derive(listening, None, false, false),
            AccuracyLabel::Initializing
        );
    }

    #[test]
    fn test_label_strings() {
        assert_eq!(AccuracyLabel::PlatformAbsolute.to_string(), "High (platform-absolute)");
        assert_eq!(AccuracyLabel::NeedsCalibration.to_string(), "Low (needs calibration)");
        assert!(AccuracyLabel::Relative.has_reading());
        assert!(!AccuracyLabel::NotSupported.has_reading());
    }

    #[test]
    fn test_serializes_human_labels() {
        let json = serde_json::to_string(&AccuracyLabel::Relative).unwrap();
        assert_eq!(json, "\"Good (relative)\"");
        let json = serde_json::to_string(&LifecyclePhase::Unavailable(
            UnavailableReason::PermissionDenied,
        ))
        .unwrap();
        assert_eq!(json, r#"{"unavailable":"permission_denied"}"#);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(LifecyclePhase::Stopped.is_terminal());
        assert!(LifecyclePhase::Unavailable(UnavailableReason::Error).is_terminal());
        assert!(!LifecyclePhase::Listening.is_terminal());
        assert!(!LifecyclePhase::Idle.is_terminal());
    }
}

//! Heading samples, smoothing, and calibration detection.
//!
//! # Module Structure
//!
//! - [`HeadingSample`] - a single normalized reading from the sensor adapter
//! - [`HeadingFilter`] - circular-mean smoothing over the last few samples
//! - [`CalibrationTracker`] - rolling window that certifies calibration once
//!   the device has been swept through enough distinct orientations
//!
//! # Data Flow
//!
//! ```text
//! OrientationEvent → classify → HeadingSample ─┬→ HeadingFilter → smoothed heading
//!                                              └→ CalibrationTracker → is_calibrated
//! ```

mod calibration;
mod filter;

pub use calibration::{CalibrationConfig, CalibrationState, CalibrationTracker};
pub use filter::{HeadingFilter, DEFAULT_FILTER_CAPACITY};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::normalize_degrees;

/// Where a heading sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingSource {
    /// A platform-native compass reading, trusted as absolute.
    NativeCompass,
    /// A generic device-orientation angle, absolute only if the platform says so.
    Orientation,
}

impl HeadingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeadingSource::NativeCompass => "native-compass",
            HeadingSource::Orientation => "orientation",
        }
    }
}

impl fmt::Display for HeadingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One heading reading, normalized to `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingSample {
    /// Magnetic heading in degrees, `[0, 360)`.
    pub heading_degrees: f64,
    /// Whether the reading is referenced to magnetic north.
    pub is_absolute: bool,
    /// Capture time in milliseconds on the session clock.
    pub captured_at_ms: u64,
    /// Which channel produced the reading.
    pub source: HeadingSource,
}

impl HeadingSample {
    /// Builds a sample, normalizing the heading.
    ///
    /// Returns `None` for non-finite headings so a single bad reading never
    /// reaches the filter.
    pub fn new(
        heading_degrees: f64,
        is_absolute: bool,
        captured_at_ms: u64,
        source: HeadingSource,
    ) -> Option<Self> {
        if !heading_degrees.is_finite() {
            return None;
        }
        Some(Self {
            heading_degrees: normalize_degrees(heading_degrees),
            is_absolute,
            captured_at_ms,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_normalizes_heading() {
        let s = HeadingSample::new(-10.0, true, 0, HeadingSource::Orientation).unwrap();
        assert!((s.heading_degrees - 350.0).abs() < 1e-9);

        let s = HeadingSample::new(370.0, true, 0, HeadingSource::Orientation).unwrap();
        assert!((s.heading_degrees - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_rejects_non_finite() {
        assert!(HeadingSample::new(f64::NAN, true, 0, HeadingSource::NativeCompass).is_none());
        assert!(HeadingSample::new(f64::INFINITY, false, 0, HeadingSource::Orientation).is_none());
    }

    #[test]
    fn test_source_display() {
        assert_eq!(HeadingSource::NativeCompass.to_string(), "native-compass");
        assert_eq!(HeadingSource::Orientation.to_string(), "orientation");
    }
}

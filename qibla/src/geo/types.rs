//! Geographic value types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;
/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;
/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;
/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors raised when constructing a [`GeoPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoError {
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),
    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),
}

/// A position on Earth's surface in decimal degrees.
///
/// Construct through [`GeoPoint::new`] to get range validation. The fields
/// are public for pattern matching, but a point built by hand skips the
/// checks and may feed NaN into the geodesy functions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a validated point.
    ///
    /// NaN is rejected along with out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !(MIN_LAT..=MAX_LAT).contains(&latitude) {
            return Err(GeoError::InvalidLatitude(latitude));
        }
        if !(MIN_LON..=MAX_LON).contains(&longitude) {
            return Err(GeoError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in radians.
    #[inline]
    pub fn lat_rad(&self) -> f64 {
        self.latitude.to_radians()
    }

    /// Longitude in radians.
    #[inline]
    pub fn lon_rad(&self) -> f64 {
        self.longitude.to_radians()
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.6}°{}, {:.6}°{}",
            self.latitude.abs(),
            ns,
            self.longitude.abs(),
            ew
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_point() {
        let p = GeoPoint::new(21.422487, 39.826206).unwrap();
        assert_eq!(p.latitude, 21.422487);
        assert_eq!(p.longitude, 39.826206);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_invalid_latitude() {
        assert!(matches!(
            GeoPoint::new(90.5, 0.0),
            Err(GeoError::InvalidLatitude(_))
        ));
    }

    #[test]
    fn test_invalid_longitude() {
        assert!(matches!(
            GeoPoint::new(0.0, -181.0),
            Err(GeoError::InvalidLongitude(_))
        ));
    }

    #[test]
    fn test_nan_rejected() {
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_display_hemispheres() {
        let p = GeoPoint::new(-33.5, -70.25).unwrap();
        assert_eq!(p.to_string(), "33.500000°S, 70.250000°W");
    }
}

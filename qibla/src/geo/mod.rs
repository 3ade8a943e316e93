//! Geodesy on a spherical Earth.
//!
//! Provides the initial great-circle bearing and haversine distance between
//! two [`GeoPoint`]s, plus the angle normalization every other module relies
//! on to keep headings inside `[0, 360)`.

mod types;

pub use types::{GeoError, GeoPoint, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Earth mean radius in kilometres (IUGG).
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0088;

/// The Kaaba in Makkah, the default reference point.
pub const KAABA: GeoPoint = GeoPoint {
    latitude: 21.422487,
    longitude: 39.826206,
};

/// Normalizes an angle in degrees into `[0, 360)`.
///
/// NaN passes through unchanged.
#[inline]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Smallest absolute difference between two angles, in `[0, 180]`.
#[inline]
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = normalize_degrees(a - b);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Initial great-circle bearing from `origin` to `target`, in `[0, 360)`.
///
/// Identical points have no defined bearing; the formula then degenerates to
/// `atan2(0, 0)` and the result is meaningless but finite. NaN coordinates
/// propagate NaN, so validate with [`GeoPoint::new`] first.
pub fn bearing_to(origin: &GeoPoint, target: &GeoPoint) -> f64 {
    let lat1 = origin.lat_rad();
    let lat2 = target.lat_rad();
    let delta_lon = target.lon_rad() - origin.lon_rad();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    normalize_degrees(y.atan2(x).to_degrees())
}

/// Great-circle distance in kilometres using the haversine formula.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let delta_lat = b.lat_rad() - a.lat_rad();
    let delta_lon = b.lon_rad() - a.lon_rad();

    let h = (delta_lat / 2.0).sin().powi(2)
        + a.lat_rad().cos() * b.lat_rad().cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_MEAN_RADIUS_KM * c
}

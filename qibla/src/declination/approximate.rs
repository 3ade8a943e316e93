//! Offline regional declination approximation.
//!
//! A coarse lookup of latitude/longitude bands, each with a 2020 baseline and
//! a linear secular drift. Accurate to a few degrees in populated regions and
//! much worse near the magnetic poles, which is acceptable for a fallback.

use crate::geo::GeoPoint;

/// Epoch the band baselines were taken from.
pub const BASELINE_YEAR: i32 = 2020;

/// Hard limit on the approximated magnitude.
pub const MAX_APPROXIMATION_DEG: f64 = 35.0;

/// A rectangular region with a baseline declination.
#[derive(Debug, Clone, Copy)]
struct RegionBand {
    name: &'static str,
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
    /// Declination at [`BASELINE_YEAR`], degrees east.
    baseline_deg: f64,
    /// Secular variation, degrees per year.
    drift_deg_per_year: f64,
}

impl RegionBand {
    fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude >= self.lat_min
            && point.latitude < self.lat_max
            && point.longitude >= self.lon_min
            && point.longitude < self.lon_max
    }
}

#[rustfmt::skip]
const BANDS: &[RegionBand] = &[
    RegionBand { name: "alaska",              lat_min:  50.0, lat_max: 90.1, lon_min: -180.0, lon_max: -130.0, baseline_deg:  16.0, drift_deg_per_year: -0.20 },
    RegionBand { name: "north-atlantic",      lat_min:  55.0, lat_max: 90.1, lon_min:  -60.0, lon_max:  -10.0, baseline_deg: -25.0, drift_deg_per_year:  0.40 },
    RegionBand { name: "western-n-america",   lat_min:  15.0, lat_max: 90.1, lon_min: -130.0, lon_max: -100.0, baseline_deg:  11.0, drift_deg_per_year: -0.10 },
    RegionBand { name: "eastern-n-america",   lat_min:  15.0, lat_max: 90.1, lon_min: -100.0, lon_max:  -50.0, baseline_deg:  -8.0, drift_deg_per_year: -0.05 },
    RegionBand { name: "central-america",     lat_min:   0.0, lat_max: 15.0, lon_min: -120.0, lon_max:  -55.0, baseline_deg:  -3.0, drift_deg_per_year: -0.10 },
    RegionBand { name: "south-america",       lat_min: -90.0, lat_max:  0.0, lon_min:  -90.0, lon_max:  -30.0, baseline_deg: -14.0, drift_deg_per_year: -0.10 },
    RegionBand { name: "western-europe",      lat_min:  35.0, lat_max: 90.1, lon_min:  -10.0, lon_max:   20.0, baseline_deg:   2.0, drift_deg_per_year:  0.15 },
    RegionBand { name: "eastern-europe",      lat_min:  35.0, lat_max: 90.1, lon_min:   20.0, lon_max:   60.0, baseline_deg:   8.0, drift_deg_per_year:  0.10 },
    RegionBand { name: "n-africa-mideast",    lat_min:  10.0, lat_max: 35.0, lon_min:  -20.0, lon_max:   60.0, baseline_deg:   3.0, drift_deg_per_year:  0.05 },
    RegionBand { name: "southern-africa",     lat_min: -90.0, lat_max: -15.0, lon_min:  10.0, lon_max:   55.0, baseline_deg: -22.0, drift_deg_per_year: -0.10 },
    RegionBand { name: "equatorial-africa",   lat_min: -15.0, lat_max: 10.0, lon_min:  -20.0, lon_max:   55.0, baseline_deg:  -1.0, drift_deg_per_year:  0.05 },
    RegionBand { name: "south-asia",          lat_min:   0.0, lat_max: 35.0, lon_min:   60.0, lon_max:  100.0, baseline_deg:   0.0, drift_deg_per_year:  0.05 },
    RegionBand { name: "central-north-asia",  lat_min:  35.0, lat_max: 90.1, lon_min:   60.0, lon_max:  140.0, baseline_deg:  -3.0, drift_deg_per_year:  0.05 },
    RegionBand { name: "east-se-asia",        lat_min: -10.0, lat_max: 35.0, lon_min:  100.0, lon_max:  150.0, baseline_deg:  -2.0, drift_deg_per_year:  0.00 },
    RegionBand { name: "oceania",             lat_min: -90.0, lat_max: -10.0, lon_min: 110.0, lon_max:  180.1, baseline_deg:   8.0, drift_deg_per_year:  0.02 },
];

/// Approximates declination in degrees (positive east) for a point and year.
///
/// Points outside every band fall back to a three-way split: the Americas,
/// the Asia-Pacific, and everything else.
pub fn approximate_declination(point: &GeoPoint, year: i32) -> f64 {
    let years = (year - BASELINE_YEAR) as f64;

    let raw = match BANDS.iter().find(|band| band.contains(point)) {
        Some(band) => {
            tracing::trace!(band = band.name, "Declination band matched");
            band.baseline_deg + band.drift_deg_per_year * years
        }
        None if point.longitude < -30.0 => -15.0,
        None if point.longitude > 120.0 => 10.0,
        None => 5.0,
    };

    raw.clamp(-MAX_APPROXIMATION_DEG, MAX_APPROXIMATION_DEG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::KAABA;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn test_makkah_baseline() {
        let d = approximate_declination(&KAABA, BASELINE_YEAR);
        assert!((d - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_secular_drift_applied() {
        let d2020 = approximate_declination(&point(48.85, 2.35), 2020);
        let d2030 = approximate_declination(&point(48.85, 2.35), 2030);
        assert!((d2030 - d2020 - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_americas_are_west() {
        assert!(approximate_declination(&point(40.7, -74.0), 2024) < 0.0);
        assert!(approximate_declination(&point(-23.5, -46.6), 2024) < 0.0);
    }

    #[test]
    fn test_fallback_for_uncovered_pacific() {
        // Mid-Pacific south of Hawaii isn't in any band
        assert_eq!(approximate_declination(&point(5.0, -150.0), 2024), -15.0);
        assert_eq!(approximate_declination(&point(5.0, 170.0), 2024), 10.0);
    }

    #[test]
    fn test_clamped_far_from_baseline() {
        let d = approximate_declination(&point(70.0, -40.0), 3000);
        assert_eq!(d, MAX_APPROXIMATION_DEG);
        let d = approximate_declination(&point(60.0, -150.0), 3000);
        assert_eq!(d, -MAX_APPROXIMATION_DEG);
    }

    #[test]
    fn test_poles_and_antimeridian_covered() {
        for (lat, lon) in [(90.0, 180.0), (-90.0, -180.0), (90.0, 0.0), (-90.0, 180.0)] {
            let d = approximate_declination(&point(lat, lon), 2024);
            assert!(d.abs() <= MAX_APPROXIMATION_DEG);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_always_within_clamp(
                lat in -90.0..=90.0_f64,
                lon in -180.0..=180.0_f64,
                year in 1900i32..2500,
            ) {
                let d = approximate_declination(&point(lat, lon), year);
                prop_assert!((-35.0..=35.0).contains(&d));
            }
        }
    }
}

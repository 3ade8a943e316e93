//! Common helpers shared across CLI commands.

use qibla::config::ConfigFile;
use qibla::geo::GeoPoint;

use crate::error::CliError;

/// Resolves the target: CLI arguments take precedence, then config.
///
/// Both coordinates must be given together.
pub fn resolve_target(
    latitude: Option<f64>,
    longitude: Option<f64>,
    config: &ConfigFile,
) -> Result<GeoPoint, CliError> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => Ok(GeoPoint::new(lat, lon)?),
        (None, None) => Ok(config.target_point()?),
        _ => Err(CliError::Config(
            "--target-lat and --target-lon must be given together".to_string(),
        )),
    }
}

/// Formats a declination as `3.41° E`.
pub fn format_declination(degrees: f64) -> String {
    let side = if degrees < 0.0 { "W" } else { "E" };
    format!("{:.2}° {}", degrees.abs(), side)
}

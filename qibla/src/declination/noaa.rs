//! NOAA geomagnetic calculator adapter.
//!
//! # API Endpoint
//!
//! ```text
//! GET https://www.ngdc.noaa.gov/geomag-web/calculators/calculateDeclination
//!     ?lat1={lat}&lon1={lon}&key={key}&startYear={year}&resultFormat=json
//! ```
//!
//! The JSON body carries a `result` array; the first entry's `declination`
//! field is the value in degrees, positive east.

use serde::Deserialize;

use super::DeclinationError;
use crate::geo::GeoPoint;

/// Public NOAA calculator endpoint.
pub const NOAA_ENDPOINT: &str =
    "https://www.ngdc.noaa.gov/geomag-web/calculators/calculateDeclination";

/// Key published for the NOAA web calculator.
pub const NOAA_PUBLIC_KEY: &str = "zNEw7";

#[derive(Debug, Deserialize)]
struct NoaaResponse {
    result: Vec<NoaaResult>,
}

#[derive(Debug, Deserialize)]
struct NoaaResult {
    declination: f64,
}

/// Builds the lookup URL for a point and model year.
pub fn build_url(endpoint: &str, api_key: &str, point: &GeoPoint, year: i32) -> String {
    format!(
        "{}?lat1={}&lon1={}&key={}&startYear={}&resultFormat=json",
        endpoint, point.latitude, point.longitude, api_key, year
    )
}

/// Extracts the declination from a response body.
///
/// Anything other than a finite value within ±180° is malformed.
pub fn parse_response(body: &[u8]) -> Result<f64, DeclinationError> {
    let response: NoaaResponse = serde_json::from_slice(body)
        .map_err(|e| DeclinationError::Malformed(format!("invalid JSON: {}", e)))?;

    let declination = response
        .result
        .first()
        .map(|r| r.declination)
        .ok_or_else(|| DeclinationError::Malformed("empty result array".to_string()))?;

    if !declination.is_finite() || declination.abs() > 180.0 {
        return Err(DeclinationError::Malformed(format!(
            "declination out of range: {}",
            declination
        )));
    }

    Ok(declination)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_construction() {
        let point = GeoPoint::new(21.5, 39.25).unwrap();
        let url = build_url(NOAA_ENDPOINT, NOAA_PUBLIC_KEY, &point, 2026);
        assert_eq!(
            url,
            "https://www.ngdc.noaa.gov/geomag-web/calculators/calculateDeclination\
             ?lat1=21.5&lon1=39.25&key=zNEw7&startYear=2026&resultFormat=json"
        );
    }

    #[test]
    fn test_parse_valid_response() {
        let body = br#"{"result":[{"date":2026.0,"declination":3.41,"latitude":21.5,"longitude":39.25}],"units":{}}"#;
        assert!((parse_response(body).unwrap() - 3.41).abs() < 1e-9);
    }

    #[test]
    fn test_parse_negative_declination() {
        let body = br#"{"result":[{"declination":-13.2}]}"#;
        assert!((parse_response(body).unwrap() + 13.2).abs() < 1e-9);
    }

    #[test]
    fn test_parse_empty_result() {
        let body = br#"{"result":[]}"#;
        assert!(matches!(
            parse_response(body),
            Err(DeclinationError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_not_json() {
        assert!(matches!(
            parse_response(b"<html>Service Unavailable</html>"),
            Err(DeclinationError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_missing_field() {
        let body = br#"{"result":[{"inclination":40.0}]}"#;
        assert!(parse_response(body).is_err());
    }

    #[test]
    fn test_parse_out_of_range() {
        let body = br#"{"result":[{"declination":512.0}]}"#;
        assert!(parse_response(body).is_err());
    }
}

//! Magnetic declination resolution.
//!
//! Converts magnetic headings to true headings. The provider prefers a
//! measured value from the NOAA geomagnetic calculator and degrades to an
//! offline regional approximation whenever the lookup fails for any reason.
//!
//! # Resolution Flow
//!
//! ```text
//! resolve(point)
//!     ├─ cached record within tolerance? → return cached
//!     ├─ lookup enabled → NOAA request ─ ok → Measured
//!     │                                └ err/timeout/malformed → Approximated
//!     └─ lookup disabled → Approximated
//! ```
//!
//! `resolve` never returns an error: a best-effort correction is always
//! better than none.

mod approximate;
mod http;
mod noaa;

pub use approximate::{approximate_declination, BASELINE_YEAR, MAX_APPROXIMATION_DEG};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_HTTP_TIMEOUT};
pub use noaa::{NOAA_ENDPOINT, NOAA_PUBLIC_KEY};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;

use std::fmt;
use std::time::Duration;

use chrono::Datelike;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::geo::{distance_km, GeoPoint};

/// Default radius within which a cached record is reused.
pub const DEFAULT_CACHE_TOLERANCE_KM: f64 = 0.1;

/// Errors from the measured lookup path.
///
/// These never escape [`DeclinationProvider::resolve`]; they are logged and
/// replaced by the approximation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeclinationError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Lookup timed out")]
    Timeout,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// How a declination value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclinationSource {
    /// Returned by the geomagnetic model service.
    Measured,
    /// Computed from the offline regional table.
    Approximated,
}

impl DeclinationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclinationSource::Measured => "measured",
            DeclinationSource::Approximated => "approximated",
        }
    }
}

impl fmt::Display for DeclinationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved declination for a location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeclinationRecord {
    /// Declination in degrees, positive east.
    pub degrees: f64,
    pub source: DeclinationSource,
    pub for_location: GeoPoint,
}

impl DeclinationRecord {
    /// Whether this record still applies at `point`.
    pub fn applies_to(&self, point: &GeoPoint, tolerance_km: f64) -> bool {
        distance_km(&self.for_location, point) <= tolerance_km
    }
}

/// Configuration for [`DeclinationProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeclinationConfig {
    /// Whether the network lookup is attempted at all.
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: String,
    /// Upper bound on a single lookup, on top of the client's own timeout.
    pub timeout: Duration,
    pub cache_tolerance_km: f64,
    /// Model year override; `None` uses the current UTC year.
    pub reference_year: Option<i32>,
}

impl Default for DeclinationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: NOAA_ENDPOINT.to_string(),
            api_key: NOAA_PUBLIC_KEY.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            cache_tolerance_km: DEFAULT_CACHE_TOLERANCE_KM,
            reference_year: None,
        }
    }
}

/// Resolves magnetic declination, caching the last result.
///
/// # Example
///
/// ```ignore
/// use qibla::declination::{AsyncReqwestClient, DeclinationConfig, DeclinationProvider};
///
/// let provider = DeclinationProvider::new(AsyncReqwestClient::new()?, DeclinationConfig::default());
/// let record = provider.resolve(observer).await;
/// println!("{:.2}° ({})", record.degrees, record.source);
/// ```
pub struct DeclinationProvider<C: AsyncHttpClient> {
    client: C,
    config: DeclinationConfig,
    cache: Mutex<Option<DeclinationRecord>>,
}

impl<C: AsyncHttpClient> fmt::Debug for DeclinationProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclinationProvider")
            .field("config", &self.config)
            .field("cached", &*self.cache.lock())
            .finish()
    }
}

impl<C: AsyncHttpClient> DeclinationProvider<C> {
    pub fn new(client: C, config: DeclinationConfig) -> Self {
        Self {
            client,
            config,
            cache: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DeclinationConfig {
        &self.config
    }

    /// Resolves declination for `point`. Never fails.
    pub async fn resolve(&self, point: GeoPoint) -> DeclinationRecord {
        if let Some(cached) = self.cached_for(&point) {
            tracing::debug!(
                degrees = cached.degrees,
                source = %cached.source,
                "Declination cache hit"
            );
            return cached;
        }

        let year = self.model_year();

        let record = if self.config.enabled {
            match self.lookup(&point, year).await {
                Ok(degrees) => {
                    tracing::info!(
                        location = %point,
                        degrees = format!("{:.2}°", degrees),
                        "Magnetic declination measured"
                    );
                    DeclinationRecord {
                        degrees,
                        source: DeclinationSource::Measured,
                        for_location: point,
                    }
                }
                Err(e) => {
                    let degrees = approximate_declination(&point, year);
                    tracing::warn!(
                        error = %e,
                        location = %point,
                        degrees = format!("{:.2}°", degrees),
                        "Declination lookup failed, using regional approximation"
                    );
                    Self::approximated(point, degrees)
                }
            }
        } else {
            Self::approximated(point, approximate_declination(&point, year))
        };

        *self.cache.lock() = Some(record);
        record
    }

    /// Queries the geomagnetic service without any fallback.
    pub async fn lookup(&self, point: &GeoPoint, year: i32) -> Result<f64, DeclinationError> {
        let url = noaa::build_url(&self.config.endpoint, &self.config.api_key, point, year);
        tracing::debug!(url = %url, "Requesting magnetic declination");

        let body = tokio::time::timeout(self.config.timeout, self.client.get(&url))
            .await
            .map_err(|_| DeclinationError::Timeout)??;

        noaa::parse_response(&body)
    }

    /// The last resolved record, if any.
    pub fn cached(&self) -> Option<DeclinationRecord> {
        *self.cache.lock()
    }

    /// Drops the cached record so the next call re-resolves.
    pub fn invalidate(&self) {
        self.cache.lock().take();
    }

    fn cached_for(&self, point: &GeoPoint) -> Option<DeclinationRecord> {
        let cached = *self.cache.lock();
        cached.filter(|r| r.applies_to(point, self.config.cache_tolerance_km))
    }

    fn model_year(&self) -> i32 {
        self.config
            .reference_year
            .unwrap_or_else(|| chrono::Utc::now().year())
    }

    fn approximated(point: GeoPoint, degrees: f64) -> DeclinationRecord {
        DeclinationRecord {
            degrees,
            source: DeclinationSource::Approximated,
            for_location: point,
        }
    }
}

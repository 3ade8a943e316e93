//! HTTP client abstraction for testability

use std::time::Duration;

use futures::future::BoxFuture;

use super::DeclinationError;

/// Default request timeout for geomagnetic lookups.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait for async HTTP GET requests.
///
/// Returns a boxed future so the trait stays object-safe and mock clients
/// can be swapped in for tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// Any non-2xx status is reported as an error.
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, DeclinationError>>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a client with the default timeout.
    pub fn new() -> Result<Self, DeclinationError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, DeclinationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeclinationError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, DeclinationError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        DeclinationError::Timeout
                    } else {
                        DeclinationError::Http(format!("Request failed: {}", e))
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(DeclinationError::Status(status.as_u16()));
            }

            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| DeclinationError::Http(format!("Failed to read response: {}", e)))
        })
    }
}

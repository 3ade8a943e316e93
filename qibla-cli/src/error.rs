//! CLI error type.

use std::fmt;

use qibla::config::ConfigError;
use qibla::declination::DeclinationError;
use qibla::geo::GeoError;
use qibla::logging::LoggingError;
use qibla::session::SessionError;

/// Errors surfaced to the user by `main`.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file could not be read, written, or edited.
    Config(String),

    /// A latitude or longitude argument is out of range.
    Location(GeoError),

    /// The HTTP client for declination lookups couldn't be built.
    Client(DeclinationError),

    /// The session refused to start.
    Session(SessionError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// Failed to create the Tokio runtime or join a task.
    Runtime(String),

    /// Failed to write command output.
    Output(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Location(e) => write!(f, "Invalid location: {}", e),
            CliError::Client(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Session(e) => write!(f, "Session error: {}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            CliError::Output(msg) => write!(f, "Output error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Location(e) => Some(e),
            CliError::Client(e) => Some(e),
            CliError::Session(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Config(_) | CliError::Runtime(_) | CliError::Output(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<GeoError> for CliError {
    fn from(e: GeoError) -> Self {
        CliError::Location(e)
    }
}

impl From<DeclinationError> for CliError {
    fn from(e: DeclinationError) -> Self {
        CliError::Client(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = CliError::Config("bad key".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn test_from_geo_error() {
        let err: CliError = GeoError::InvalidLatitude(95.0).into();
        assert!(matches!(err, CliError::Location(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_config_error() {
        let err: CliError = ConfigError::UnknownKey("compass.colour".to_string()).into();
        assert!(err.to_string().contains("compass.colour"));
    }
}

//! Tracing subscriber setup.
//!
//! Logs go to stderr (stdout is reserved for command output) and optionally
//! to a file through a non-blocking writer. `RUST_LOG` overrides the
//! configured level.
//!
//! ```rust,ignore
//! use qibla::logging::{init_logging, LoggingConfig};
//!
//! let _guard = init_logging(&LoggingConfig::default())?;
//! tracing::info!("Compass ready");
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt as fmt_layer, prelude::*, EnvFilter};

/// Errors from logging initialization.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log file path: {0}")]
    InvalidPath(PathBuf),

    #[error("Failed to open log file {path}: {reason}")]
    File { path: PathBuf, reason: String },

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Unknown log level '{0}' (expected trace, debug, info, warn or error)")]
    UnknownLevel(String),
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(LoggingError::UnknownLevel(s.to_string())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Also write logs to this file.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Keeps the file writer flushing. Hold it until the process exits.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Installs the global subscriber.
///
/// Fails if a global subscriber is already set or the log file can't be
/// opened.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let stderr_layer = fmt_layer::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, file_guard) = match &config.file {
        Some(path) => {
            let appender = file_appender(path)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt_layer::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard { _file: file_guard })
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, LoggingError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;

    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    std::fs::create_dir_all(&directory).map_err(|e| LoggingError::File {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&directory)
        .map_err(|e| LoggingError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

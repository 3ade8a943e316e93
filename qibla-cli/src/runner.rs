//! Shared setup for commands that do real work.

use tracing::info;

use qibla::config::ConfigFile;
use qibla::declination::{AsyncReqwestClient, DeclinationProvider};
use qibla::logging::{init_logging, LogLevel, LoggingGuard};

use crate::error::CliError;

/// Loaded configuration plus an initialized logger.
pub struct CliRunner {
    config: ConfigFile,
    _log_guard: LoggingGuard,
}

impl CliRunner {
    /// Loads the config file and installs logging. `verbose` forces debug.
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let mut logging = config.logging_config();
        if verbose {
            logging.level = LogLevel::Debug;
        }
        let guard = init_logging(&logging)?;

        Ok(Self {
            config,
            _log_guard: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(version = qibla::VERSION, command, "qibla starting");
    }

    pub fn runtime(&self) -> Result<tokio::runtime::Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Runtime(e.to_string()))
    }

    /// Builds a provider from config; `offline` disables the network lookup.
    pub fn declination_provider(
        &self,
        offline: bool,
    ) -> Result<DeclinationProvider<AsyncReqwestClient>, CliError> {
        let mut config = self.config.declination_config();
        if offline {
            config.enabled = false;
        }
        let client = AsyncReqwestClient::with_timeout(config.timeout)?;
        Ok(DeclinationProvider::new(client, config))
    }
}

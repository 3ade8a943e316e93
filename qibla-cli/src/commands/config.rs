//! Configuration management CLI commands.
//!
//! `config get`, `config set`, `config list`, and `config path` view and edit
//! `~/.qibla/config.ini` without opening it by hand.

use std::path::Path;

use clap::Subcommand;
use qibla::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., compass.filter_capacity)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., target.latitude)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    let path = config_file_path();

    match command {
        ConfigCommands::Get { key } => {
            let value = get_value(&path, &key)?;
            println!("{}", if value.is_empty() { "(not set)" } else { value.as_str() });
        }
        ConfigCommands::Set { key, value } => {
            let (config_key, stored) = set_value(&path, &key, &value)?;
            println!("Set {} = {}", config_key.name(), stored);
        }
        ConfigCommands::List => {
            let config = ConfigFile::load_from(&path)?;
            print!("{}", render_listing(&config));
        }
        ConfigCommands::Path => println!("{}", path.display()),
    }

    Ok(())
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'qibla config list' to see available keys.",
            key
        ))
    })
}

fn get_value(path: &Path, key: &str) -> Result<String, CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load_from(path)?;
    Ok(config_key.get(&config))
}

/// Validates and stores one value, returning the key and the value as
/// written back.
fn set_value(path: &Path, key: &str, value: &str) -> Result<(ConfigKey, String), CliError> {
    let config_key = parse_key(key)?;

    let mut config = ConfigFile::load_from(path)?;
    config_key.set(&mut config, value)?;
    config.save_to(path)?;

    Ok((config_key, config_key.get(&config)))
}

/// Every key grouped under its `[section]` header.
fn render_listing(config: &ConfigFile) -> String {
    let mut out = String::from("Configuration Settings\n======================\n");
    let mut previous: Option<&str> = None;

    for key in ConfigKey::all() {
        if previous != Some(key.section()) {
            out.push_str(&format!("\n[{}]\n", key.section()));
            previous = Some(key.section());
        }

        let value = key.get(config);
        let shown = if value.is_empty() { "(not set)" } else { value.as_str() };
        out.push_str(&format!("  {} = {}\n", key.key_name(), shown));
    }

    out
}

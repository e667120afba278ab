use crate::core::db::{ConnectOptions, Connection};
use crate::core::{Result, SweetError};
use crate::events::{EventSink, TracingSink};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings.
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    pub dsn: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub options: ConnectOptions,
}

/// Logging-related configuration.
#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log every connection event through `tracing`
    #[serde(default)]
    pub events: bool,
}

impl Config {
    /// Opens the configured connection, attaching a `TracingSink` when event
    /// logging is enabled.
    pub fn connect(&self) -> Result<Connection> {
        let sink = if self.logging.events {
            Some(Arc::new(TracingSink) as Arc<dyn EventSink>)
        } else {
            None
        };
        Connection::open(
            &self.connection.dsn,
            &self.connection.username,
            &self.connection.password,
            self.connection.options.clone(),
            sink,
        )
    }
}

/// Default configuration location, `<config dir>/sweetsql/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sweetsql").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = sweetsql::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| SweetError::Config(e.to_string()))
}

//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `TRADING__<SECTION>__<KEY>` environment variables.

mod settings;

pub use settings::{AppConfig, AppSettings, ExchangeSettings, LoggingConfig};

use config::{Config, Environment, File, FileFormat};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid [{section}] configuration: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
}

/// Load configuration from file and environment.
///
/// A missing file leaves the defaults in place.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix("TRADING")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app: AppConfig = config.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Parse configuration from a TOML string, without environment overrides.
pub fn from_toml(source: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(source, FileFormat::Toml))
        .build()?;
    let app: AppConfig = config.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

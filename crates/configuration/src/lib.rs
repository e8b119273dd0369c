use crate::error::ConfigError;
use crate::settings::Config;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{ApiConfig, ApiKeys, DispatchSettings, ServerSettings, SyncSettings};

/// Loads the application configuration from the `config.toml` file.
///
/// Environment variables prefixed with `MERIDIAN` override file values, so
/// API keys can be supplied as `MERIDIAN__API__TESTNET__KEY` (typically via a
/// `.env` file loaded at startup) instead of being written to disk.
pub fn load_config() -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        // Tells the builder to look for a file named `config.toml`
        .add_source(config::File::with_name("config.toml"))
        .add_source(config::Environment::with_prefix("MERIDIAN").separator("__"))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

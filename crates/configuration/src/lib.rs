use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    ApiConfig, ApiKeys, InstrumentConfig, RiskLimits, Schedule, Settings, SignalParams,
    TelegramConfig,
};

/// Loads and validates the application configuration from a TOML file.
///
/// This function is the primary entry point for this crate. It reads the
/// configuration file, deserializes it into our strongly-typed `Settings`
/// struct, and runs the startup validation pass.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path))
        // Secrets override file values, e.g. VIGIL__API__PRODUCTION__KEY.
        .add_source(config::Environment::with_prefix("VIGIL").separator("__"))
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;

    Ok(settings)
}

//! Configuration loading and validation
//!
//! Settings are loaded from layered sources: `config/default`, then an
//! environment-specific file, then `INTAKE_*` environment variables. Every
//! section has serde defaults so a bare process still starts with sane
//! development values.

mod settings;

pub use settings::{
    AddressValidationConfig, ClassifierConfig, ContactPolicy, NotificationConfig,
    ObservabilityConfig, PipelineSettings, RuntimeEnvironment, ServerConfig, Settings,
    ShutdownConfig, StateBackend, StateStoreConfig,
};

use config::{Config, Environment, File};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Load settings for an optional named environment.
///
/// Priority: env vars > `config/{env}` > `config/default` > struct defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder().add_source(File::with_name("config/default").required(false));

    if let Some(env) = env {
        builder = builder.add_source(File::with_name(&format!("config/{env}")).required(false));
    }

    let settings: Settings = builder
        .add_source(Environment::with_prefix("INTAKE").separator("__"))
        .build()?
        .try_deserialize()?;

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_without_files() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.environment, RuntimeEnvironment::Development);
        assert_eq!(settings.state.backend, StateBackend::Memory);
    }
}

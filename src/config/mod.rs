//! Configuration module for stack-doctor
//!
//! Handles loading settings from TOML files and secrets from `.env`.

pub mod environment;
pub mod settings;

pub use environment::Environment;
pub use settings::{
    CertSettings, ComposeSettings, ElasticsearchSettings, ImageSettings, ImageSpec,
    KafkaSettings, KibanaSettings, MongoSettings, RetrySettings, RunnerSettings, Settings,
    SqlServerSettings, ZookeeperSettings,
};

use crate::utils::ConfigError;
use std::path::Path;

/// Load settings from an explicit file, or from the default location
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    match path {
        Some(path) => Settings::load_from_file(path),
        None => Settings::load_default(),
    }
}

/// Load settings and the environment they refer to
pub fn load_config(
    settings_path: Option<&Path>,
    env_file: Option<&Path>,
) -> Result<(Settings, Environment), ConfigError> {
    let settings = load_settings(settings_path)?;
    let env_path = env_file.unwrap_or(settings.compose.env_file.as_path());
    let environment = Environment::load(env_path)?;
    Ok((settings, environment))
}

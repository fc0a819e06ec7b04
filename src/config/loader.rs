//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::DispatchConfig;
use crate::config::validation::{validate_config, InvalidSetting};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {key}")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<InvalidSetting>),
}

fn join(errors: &[InvalidSetting]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, applying process
/// environment overrides on top.
pub fn load_config(path: &Path) -> Result<DispatchConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: DispatchConfig = toml::from_str(&content)?;
    finish(config)
}

/// Build configuration from defaults plus environment overrides only.
pub fn load_from_env() -> Result<DispatchConfig, ConfigError> {
    finish(DispatchConfig::default())
}

fn finish(mut config: DispatchConfig) -> Result<DispatchConfig, ConfigError> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `DISPATCH_*` overrides read through `lookup`.
///
/// An empty `DISPATCH_API_VERSION` clears the configured version.
pub fn apply_env_overrides<F>(config: &mut DispatchConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup("DISPATCH_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(prefix) = lookup("DISPATCH_PATH_PREFIX") {
        config.routing.prefix = prefix;
    }
    if let Some(version) = lookup("DISPATCH_API_VERSION") {
        config.routing.version = if version.trim().is_empty() {
            None
        } else {
            Some(parse("DISPATCH_API_VERSION", version)?)
        };
    }
    if let Some(ttl) = lookup("DISPATCH_CACHE_TTL") {
        config.cache.ttl_secs = parse("DISPATCH_CACHE_TTL", ttl)?;
    }
    if let Some(limit) = lookup("DISPATCH_CACHE_LIMIT") {
        config.cache.limit = parse("DISPATCH_CACHE_LIMIT", limit)?;
    }
    if let Some(ttl) = lookup("DISPATCH_THROTTLE_TTL") {
        config.throttle.ttl_secs = parse("DISPATCH_THROTTLE_TTL", ttl)?;
    }
    if let Some(limit) = lookup("DISPATCH_THROTTLE_LIMIT") {
        config.throttle.limit = parse("DISPATCH_THROTTLE_LIMIT", limit)?;
    }
    if let Some(regrow) = lookup("DISPATCH_THROTTLE_REGROW") {
        config.throttle.regrow = parse("DISPATCH_THROTTLE_REGROW", regrow)?;
    }
    Ok(())
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { key, value })
}

//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `ZOMBEE_DISCORD_TOKEN` - Discord bot token
//! - `ZOMBEE_DISCORD_GUILD_ID` - Guild used for command registration
//! - `ZOMBEE_BATTLEYE_ADDRESS` - RCon server address
//! - `ZOMBEE_BATTLEYE_PORT` - RCon server port
//! - `ZOMBEE_BATTLEYE_PASSWORD` - RCon password
//! - `ZOMBEE_CHANNELS_ALERTS`, `ZOMBEE_CHANNELS_LOGS`,
//!   `ZOMBEE_CHANNELS_CHAT`, `ZOMBEE_CHANNELS_STATUS` - Discord channel ids

use std::env;
use std::str::FromStr;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "ZOMBEE";

/// Apply environment variable overrides to a config.
///
/// Sensitive values like the bot token and RCon password are usually
/// provided this way instead of through the config file.
pub fn apply_env_overrides(config: Config) -> Result<Config, ConfigError> {
    apply_overrides(config, |key| env::var(key).ok())
}

/// Apply overrides using `lookup` to fetch variable values.
fn apply_overrides<F>(mut config: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{}_{}", ENV_PREFIX, name));

    if let Some(token) = var("DISCORD_TOKEN") {
        config.discord.token = token;
    }
    if let Some(id) = var("DISCORD_GUILD_ID") {
        config.discord.guild_id = Some(parse_value("DISCORD_GUILD_ID", &id)?);
    }

    if let Some(address) = var("BATTLEYE_ADDRESS") {
        config.battleye.address = address;
    }
    if let Some(port) = var("BATTLEYE_PORT") {
        config.battleye.port = parse_value("BATTLEYE_PORT", &port)?;
    }
    if let Some(password) = var("BATTLEYE_PASSWORD") {
        config.battleye.password = password;
    }

    let channels = &mut config.channels;
    for (name, slot) in [
        ("CHANNELS_ALERTS", &mut channels.alerts),
        ("CHANNELS_LOGS", &mut channels.logs),
        ("CHANNELS_CHAT", &mut channels.chat),
        ("CHANNELS_STATUS", &mut channels.status),
    ] {
        if let Some(id) = var(name) {
            *slot = Some(parse_value(name, &id)?);
        }
    }

    Ok(config)
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        field: format!("{}_{}", ENV_PREFIX, name),
        message: format!("'{}' ({})", raw, e),
    })
}

/// Get the config file path from environment or use default.
///
/// Checks `ZOMBEE_CONFIG` environment variable, otherwise returns "zombee.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "zombee.conf".to_string())
}

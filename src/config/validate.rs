//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use fancy_regex::Regex;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Validate Discord config
    if config.discord.token.trim().is_empty() {
        errors.push("discord.token is required".to_string());
    }
    if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("discord.token has not been configured (still using placeholder)".to_string());
    } else if !config.discord.token.trim().is_empty() && !is_token_shaped(&config.discord.token) {
        errors.push("discord.token does not look like a bot token".to_string());
    }
    if config.discord.guild_id == Some(0) {
        errors.push("discord.guild_id must be non-zero".to_string());
    }

    // Validate BattlEye config
    if config.battleye.address.trim().is_empty() {
        errors.push("battleye.address is required".to_string());
    }
    if config.battleye.port == 0 {
        errors.push("battleye.port must be non-zero".to_string());
    }
    if !config.battleye.is_loopback() && config.battleye.password.is_empty() {
        errors.push(format!(
            "battleye.password is required for remote server '{}'",
            config.battleye.address
        ));
    }
    if config.battleye.connection_timeout_secs == 0 {
        errors.push("battleye.connection_timeout_secs must be non-zero".to_string());
    }
    if config.battleye.keep_alive_secs == 0 {
        errors.push("battleye.keep_alive_secs must be non-zero".to_string());
    }

    // Validate channel ids
    for (name, id) in [
        ("alerts", config.channels.alerts),
        ("logs", config.channels.logs),
        ("chat", config.channels.chat),
        ("status", config.channels.status),
    ] {
        if id == Some(0) {
            errors.push(format!("channels.{} must be non-zero", name));
        }
    }

    if !config.relay.status_format.contains("%count") {
        errors.push(format!(
            "relay.status_format '{}' must contain the %count placeholder",
            config.relay.status_format
        ));
    }

    // Validate filter patterns (try to compile them)
    if let Some(ref filters) = config.filters {
        for (i, pattern) in filters.patterns.iter().enumerate() {
            if Regex::new(pattern).is_err() {
                errors.push(format!(
                    "filters.patterns[{}] is not a valid regex: '{}'",
                    i, pattern
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

/// Bot tokens are three URL-safe base64 segments joined by dots.
fn is_token_shaped(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    const TOKEN: &str = "MTIzNDU2Nzg5MDEyMzQ1Njc4.GaBcDe.abcdefghijklmnopqrstuvwxyz0123456789AB";

    fn make_valid_config() -> Config {
        Config {
            discord: DiscordConfig {
                token: TOKEN.to_string(),
                guild_id: Some(123456789),
                register_commands: false,
                activity: None,
            },
            battleye: BattlEyeConfig {
                address: "10.1.2.3".to_string(),
                password: "secret".to_string(),
                ..BattlEyeConfig::default()
            },
            channels: ChannelsConfig {
                alerts: Some(1),
                logs: Some(2),
                chat: Some(3),
                status: Some(4),
            },
            relay: RelayConfig::default(),
            filters: None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = String::new();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("discord.token"));
    }

    #[test]
    fn test_malformed_token_fails() {
        for token in ["not a token", "abc.def", "abc..ghi", "a.b.c.d", "a b.c.d"] {
            let mut config = make_valid_config();
            config.discord.token = token.to_string();

            let result = validate_config(&config);
            assert!(
                result.unwrap_err().to_string().contains("does not look like a bot token"),
                "{} accepted",
                token
            );
        }
    }

    #[test]
    fn test_placeholder_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = "YOUR_DISCORD_TOKEN_HERE".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("placeholder"));
    }

    #[test]
    fn test_remote_server_requires_password() {
        let mut config = make_valid_config();
        config.battleye.password = String::new();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("battleye.password"));
    }

    #[test]
    fn test_loopback_server_allows_empty_password() {
        let mut config = make_valid_config();
        config.battleye.address = "127.0.0.1".to_string();
        config.battleye.password = String::new();

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_channel_id_fails() {
        let mut config = make_valid_config();
        config.channels.chat = Some(0);

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("channels.chat"));
    }

    #[test]
    fn test_missing_channels_are_allowed() {
        let mut config = make_valid_config();
        config.channels = ChannelsConfig::default();

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_status_format_needs_placeholder() {
        let mut config = make_valid_config();
        config.relay.status_format = "Survivors Online".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("%count"));
    }

    #[test]
    fn test_invalid_regex_filter_fails() {
        let mut config = make_valid_config();
        config.filters = Some(FiltersConfig {
            enabled: true,
            patterns: vec!["[invalid".to_string()],
        });

        let result = validate_config(&config);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("not a valid regex"));
    }

    #[test]
    fn test_all_errors_reported_together() {
        let mut config = make_valid_config();
        config.discord.token = String::new();
        config.battleye.port = 0;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("discord.token"));
        assert!(message.contains("battleye.port"));
    }
}

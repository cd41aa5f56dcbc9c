//! Configuration file parsing (HOCON format).

use std::path::Path;

use hocon::HoconLoader;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Load configuration from a HOCON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    HoconLoader::new()
        .load_file(path)
        .map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Load configuration from a HOCON string.
#[cfg(test)]
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_full_config() {
        let config = load_config_str(
            r#"
            discord {
                token = "abc"
                guild_id = 42
                activity = "Buzz"
            }
            battleye {
                address = "10.0.0.5"
                port = 2310
                password = "secret"
            }
            channels {
                alerts = 1
                logs = 2
                chat = 3
                status = 4
            }
            relay {
                mirror_to_logs = true
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.discord.token, "abc");
        assert_eq!(config.discord.guild_id, Some(42));
        assert_eq!(config.battleye.address, "10.0.0.5");
        assert_eq!(config.battleye.port, 2310);
        assert_eq!(config.battleye.keep_alive_secs, 30);
        assert_eq!(config.channels.status, Some(4));
        assert!(config.relay.mirror_to_logs);
        assert_eq!(config.relay.status_format, "🛜 Survivors Online: %count");
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = load_config_str(r#"discord { token = "abc" }"#).unwrap();

        assert_eq!(config.battleye.address, "127.0.0.1");
        assert_eq!(config.battleye.port, 2308);
        assert!(config.channels.alerts.is_none());
        assert!(config.filters.is_none());
    }
}

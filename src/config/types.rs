//! Configuration type definitions.

use serde::Deserialize;

/// Default label template for the status channel.
pub const DEFAULT_STATUS_FORMAT: &str = "🛜 Survivors Online: %count";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub battleye: BattlEyeConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    pub filters: Option<FiltersConfig>,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: String,
    /// Guild to register `/rcon` in. Commands are registered globally when unset.
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub register_commands: bool,
    /// Custom activity text shown under the bot's name.
    pub activity: Option<String>,
}

/// BattlEye RCon server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BattlEyeConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    /// Seconds without any packet from the server before the session is dropped.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl Default for BattlEyeConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            password: String::new(),
            connection_timeout_secs: default_connection_timeout(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl BattlEyeConfig {
    /// Whether the configured address points at this machine.
    pub fn is_loopback(&self) -> bool {
        matches!(self.address.as_str(), "127.0.0.1" | "localhost" | "::1")
    }
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    2308
}

fn default_connection_timeout() -> u64 {
    50
}

fn default_keep_alive() -> u64 {
    30
}

/// Discord channel ids for each logical output channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelsConfig {
    pub alerts: Option<u64>,
    pub logs: Option<u64>,
    pub chat: Option<u64>,
    /// Voice or stage channel renamed with the player count.
    pub status: Option<u64>,
}

/// Relay behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Status channel label, `%count` is replaced with the player count.
    #[serde(default = "default_status_format")]
    pub status_format: String,
    /// Also post every routed event to the logs channel.
    #[serde(default)]
    pub mirror_to_logs: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            status_format: default_status_format(),
            mirror_to_logs: false,
        }
    }
}

fn default_status_format() -> String {
    DEFAULT_STATUS_FORMAT.to_string()
}

/// Lines matching any of these patterns are never relayed.
#[derive(Debug, Clone, Deserialize)]
pub struct FiltersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}

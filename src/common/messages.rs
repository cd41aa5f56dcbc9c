//! Canonical message types for relay communication.
//!
//! This module defines the types that flow between the RCon client,
//! the relay orchestrator and the Discord side.

/// Event emitted by the RCon client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RconEvent {
    /// Login accepted by the server.
    Connected,
    /// Session ended (logout, shutdown or lost connection).
    Disconnected,
    /// Connection-level failure.
    Error(String),
    /// A text line from the server (server message or command response).
    Message(String),
}

/// Bot presence shown on Discord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Idle,
    DoNotDisturb,
}

/// Administrative command issued from Discord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Login,
    Logout,
    Shutdown,
    Players,
}

impl AdminCommand {
    /// Parse a `/rcon` subcommand name.
    pub fn from_subcommand(name: &str) -> Option<Self> {
        match name {
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            "shutdown" => Some(Self::Shutdown),
            "players" => Some(Self::Players),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Shutdown => "shutdown",
            Self::Players => "players",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Login => "Login.",
            Self::Logout => "Logout.",
            Self::Shutdown => "Shuts down the server immediately.",
            Self::Players => "Shows list of users on the server.",
        }
    }

    /// Server command text for subcommands that map to an RCon command.
    pub fn server_command(&self) -> Option<&'static str> {
        match self {
            Self::Shutdown => Some("#shutdown"),
            Self::Players => Some("players"),
            Self::Login | Self::Logout => None,
        }
    }

    pub fn all() -> [AdminCommand; 4] {
        [Self::Login, Self::Logout, Self::Shutdown, Self::Players]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommand_parsing() {
        assert_eq!(AdminCommand::from_subcommand("login"), Some(AdminCommand::Login));
        assert_eq!(AdminCommand::from_subcommand("players"), Some(AdminCommand::Players));
        assert_eq!(AdminCommand::from_subcommand("kick"), None);
    }

    #[test]
    fn test_server_commands() {
        assert_eq!(AdminCommand::Shutdown.server_command(), Some("#shutdown"));
        assert_eq!(AdminCommand::Players.server_command(), Some("players"));
        assert_eq!(AdminCommand::Login.server_command(), None);
        assert_eq!(AdminCommand::Logout.server_command(), None);
    }
}

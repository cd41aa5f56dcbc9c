//! Routing of classified events to logical Discord channels.

use crate::bridge::classifier::{ChannelKind, EventKind, ServerEvent};

/// Embed colors.
pub mod colors {
    pub const CONNECTED: u32 = 0x009900;
    pub const DISCONNECTED: u32 = 0xCC0000;
    pub const SERVER_EVENT: u32 = 0x0099FF;
    pub const ADMIN: u32 = 0xFF9900;
    pub const ERROR: u32 = 0xFF9900;
}

const CONNECTED_ICON: &str = "https://i.imgur.com/E4ukBbS.png";
const DISCONNECTED_ICON: &str = "https://i.imgur.com/VttZve9.png";
const SERVER_EVENT_ICON: &str = "https://i.imgur.com/EoLa7sV.png";
const ERROR_ICON: &str = "https://i.imgur.com/wZ1xLrf.png";

/// Command that asks the server for the player list.
pub const PLAYERS_COMMAND: &str = "players";

/// Output destinations, independent of Discord channel ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalChannel {
    Alerts,
    Logs,
    Chat,
    Status,
}

impl LogicalChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalChannel::Alerts => "alerts",
            LogicalChannel::Logs => "logs",
            LogicalChannel::Chat => "chat",
            LogicalChannel::Status => "status",
        }
    }
}

impl std::fmt::Display for LogicalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform-neutral description of an embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedSpec {
    pub color: u32,
    pub author: Option<String>,
    pub icon_url: Option<String>,
    pub title: Option<String>,
    pub description: String,
}

impl EmbedSpec {
    fn authored(color: u32, author: &str, icon_url: &str, description: String) -> Self {
        Self {
            color,
            author: Some(author.to_string()),
            icon_url: Some(icon_url.to_string()),
            title: None,
            description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendering {
    Embed(EmbedSpec),
    Text(String),
}

/// A rendering bound for a logical channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub target: LogicalChannel,
    pub rendering: Rendering,
}

/// Render an event for its target channel.
///
/// Population reports return `None`; they update the status channel
/// label instead of posting a message.
pub fn route(event: &ServerEvent) -> Option<RenderedMessage> {
    let (target, rendering) = match &event.kind {
        EventKind::PopulationReport { .. } => return None,
        EventKind::PlayerConnected { .. } => (
            LogicalChannel::Alerts,
            Rendering::Embed(EmbedSpec::authored(
                colors::CONNECTED,
                "Player Connected",
                CONNECTED_ICON,
                format!("```diff\n+ {}\n```", event.raw),
            )),
        ),
        EventKind::PlayerDisconnected { .. } => (
            LogicalChannel::Alerts,
            Rendering::Embed(EmbedSpec::authored(
                colors::DISCONNECTED,
                "Player Disconnected",
                DISCONNECTED_ICON,
                format!("```diff\n- {}\n```", event.raw),
            )),
        ),
        EventKind::ChatMessage {
            channel_kind,
            speaker,
            text,
        } => (
            LogicalChannel::Chat,
            Rendering::Text(render_chat(*channel_kind, speaker, text)),
        ),
        EventKind::AdminEvent => (
            LogicalChannel::Logs,
            Rendering::Embed(EmbedSpec {
                color: colors::ADMIN,
                author: None,
                icon_url: None,
                title: Some("💻 Server Event".to_string()),
                description: event.raw.clone(),
            }),
        ),
        EventKind::Generic => (LogicalChannel::Logs, generic_rendering(&event.raw)),
    };

    Some(RenderedMessage { target, rendering })
}

/// Command to send to the server after an event, if any.
///
/// Membership changes refresh the player count since the server does not
/// push it.
pub fn follow_up_command(event: &ServerEvent) -> Option<&'static str> {
    match event.kind {
        EventKind::PlayerConnected { .. } | EventKind::PlayerDisconnected { .. } => {
            Some(PLAYERS_COMMAND)
        }
        _ => None,
    }
}

/// Copy of a routed message for the logs channel.
///
/// Returns `None` for messages that already target `logs`.
pub fn mirror_to_logs(event: &ServerEvent, routed: &RenderedMessage) -> Option<RenderedMessage> {
    if routed.target == LogicalChannel::Logs {
        return None;
    }
    Some(RenderedMessage {
        target: LogicalChannel::Logs,
        rendering: generic_rendering(&event.raw),
    })
}

/// Embed for a protocol error.
pub fn render_error(message: &str) -> RenderedMessage {
    RenderedMessage {
        target: LogicalChannel::Logs,
        rendering: Rendering::Embed(EmbedSpec::authored(
            colors::ERROR,
            "Error",
            ERROR_ICON,
            message.to_string(),
        )),
    }
}

/// Plain server-event embed for the logs channel.
pub fn render_log(text: &str) -> RenderedMessage {
    RenderedMessage {
        target: LogicalChannel::Logs,
        rendering: generic_rendering(text),
    }
}

fn generic_rendering(raw: &str) -> Rendering {
    Rendering::Embed(EmbedSpec::authored(
        colors::SERVER_EVENT,
        "Server Event",
        SERVER_EVENT_ICON,
        raw.to_string(),
    ))
}

fn render_chat(channel_kind: ChannelKind, speaker: &str, text: &str) -> String {
    let body = format!("({}) {}: {}", channel_kind.as_str(), speaker, text);
    match channel_kind {
        ChannelKind::Global => format!("```diff\n+ {}\n```", body),
        ChannelKind::Direct => format!("```fix\n{}\n```", body),
    }
}

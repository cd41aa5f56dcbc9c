//! Classification of raw RCon lines.
//!
//! Every line the server sends is turned into exactly one
//! [`Classification`]. Rules are evaluated in a fixed order and the first
//! match wins:
//!
//! 1. configured suppression filter
//! 2. player-list population report
//! 3. player connect / disconnect (with `Welcome` noise suppressed)
//! 4. in-game chat
//! 5. admin / GUID events
//! 6. anything else is generic

use fancy_regex::Regex;
use tracing::warn;

use crate::bridge::filter::LineFilter;

/// Header fragment printed at the top of a `players` response.
const PLAYER_LIST_HEADER: &str = "[IP Address]:[Port] [Ping] [GUID] [Name]";

/// Kind of chat message, decided by a leading arrow glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Global,
    Direct,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Global => "Global",
            ChannelKind::Direct => "Direct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PlayerConnected {
        player_label: String,
    },
    PlayerDisconnected {
        player_label: String,
    },
    ChatMessage {
        channel_kind: ChannelKind,
        speaker: String,
        text: String,
    },
    PopulationReport {
        count: u32,
    },
    AdminEvent,
    Generic,
}

/// A classified server line. The raw text is always kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    pub raw: String,
    pub kind: EventKind,
}

impl ServerEvent {
    fn new(raw: &str, kind: EventKind) -> Self {
        Self {
            raw: raw.to_string(),
            kind,
        }
    }
}

/// Outcome of classifying one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Known noise: not relayed, not posted to logs.
    Suppressed,
    Event(ServerEvent),
}

/// Classifies raw server lines into events.
pub struct LineClassifier {
    filter: Option<LineFilter>,
    population_pattern: Regex,
    player_label_pattern: Regex,
    server_prefix_pattern: Regex,
    /// Lines that look like system output once the prefix is stripped.
    system_patterns: Vec<Regex>,
    global_chat_pattern: Regex,
    fallback_chat_pattern: Regex,
    arrow_pattern: Regex,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LineClassifier {
    pub fn new(filter: Option<LineFilter>) -> Self {
        Self {
            filter,
            population_pattern: Regex::new(r"(?i)\((\d+)\s+players?\s+in\s+total\)").unwrap(),
            player_label_pattern: Regex::new(
                r"Player\s+#\d+\s+(.+?)(?:\s+\([^)]*\))?\s+(?:dis)?connected",
            )
            .unwrap(),
            server_prefix_pattern: Regex::new(r"(?i)^.*BattlEye Server:\s*").unwrap(),
            system_patterns: vec![
                Regex::new(r"(?i)^Player\s+#\d+\s+").unwrap(),
                Regex::new(r"(?i)^\d{2}:\d{2}:\d{2}\s+Player\s+").unwrap(),
                Regex::new(r"(?i)-+\s*BE GUID:").unwrap(),
                Regex::new(r"(?i)^RCon admin\s+#\d+").unwrap(),
                Regex::new(r"(?i)\b(?:connecting|connected|disconnected)\b\.?$").unwrap(),
            ],
            global_chat_pattern: Regex::new(r"(?i)\(Global\)\s*([^:]+):\s*(.+)$").unwrap(),
            fallback_chat_pattern: Regex::new(r"^\s*([^:]+):\s*(.+)$").unwrap(),
            arrow_pattern: Regex::new(r"^(?:ᐅ|▶|▷|>)+\s*").unwrap(),
        }
    }

    /// Classify one line. Never fails; unmatched lines are `Generic`.
    pub fn classify(&self, line: &str) -> Classification {
        if let Some(filter) = &self.filter {
            if filter.should_suppress(line) {
                return Classification::Suppressed;
            }
        }

        if line.contains(PLAYER_LIST_HEADER) {
            let kind = match self.population_count(line) {
                Some(count) => EventKind::PopulationReport { count },
                None => EventKind::Generic,
            };
            return Classification::Event(ServerEvent::new(line, kind));
        }

        if line.contains("Player #") {
            if line.contains("Welcome") {
                return Classification::Suppressed;
            }
            if line.contains(" disconnected") {
                let player_label = self.player_label(line);
                return Classification::Event(ServerEvent::new(
                    line,
                    EventKind::PlayerDisconnected { player_label },
                ));
            }
            if line.contains(" connected") {
                let player_label = self.player_label(line);
                return Classification::Event(ServerEvent::new(
                    line,
                    EventKind::PlayerConnected { player_label },
                ));
            }
        }

        if line.contains("(Global)") {
            if let Some(kind) = self.chat(line) {
                return Classification::Event(ServerEvent::new(line, kind));
            }
        }

        if (line.contains("RCon") || line.contains("GUID")) && !line.contains("Welcome") {
            return Classification::Event(ServerEvent::new(line, EventKind::AdminEvent));
        }

        Classification::Event(ServerEvent::new(line, EventKind::Generic))
    }

    fn population_count(&self, line: &str) -> Option<u32> {
        let caps = self.population_pattern.captures(line).ok()??;
        caps.get(1)?.as_str().parse().ok()
    }

    /// Player name when recognisable, otherwise everything after `Player #`.
    fn player_label(&self, line: &str) -> String {
        if let Ok(Some(caps)) = self.player_label_pattern.captures(line) {
            if let Some(name) = caps.get(1) {
                return name.as_str().trim().to_string();
            }
        }

        line.split_once("Player #")
            .map(|(_, rest)| rest.trim().to_string())
            .unwrap_or_default()
    }

    fn chat(&self, line: &str) -> Option<EventKind> {
        let stripped = self.server_prefix_pattern.replace(line, "");
        let stripped = stripped.trim();

        if self.system_patterns.iter().any(|p| matches(p, stripped)) {
            return None;
        }

        let caps = match self.global_chat_pattern.captures(stripped) {
            Ok(Some(caps)) => caps,
            _ => self.fallback_chat_pattern.captures(stripped).ok()??,
        };

        let speaker = caps.get(1)?.as_str().trim().to_string();
        let text = caps.get(2)?.as_str().trim();

        let (channel_kind, text) = if matches(&self.arrow_pattern, text) {
            let without_arrow = self.arrow_pattern.replace(text, "");
            (ChannelKind::Global, without_arrow.trim().to_string())
        } else {
            (ChannelKind::Direct, text.to_string())
        };

        Some(EventKind::ChatMessage {
            channel_kind,
            speaker,
            text,
        })
    }
}

fn matches(pattern: &Regex, text: &str) -> bool {
    pattern.is_match(text).unwrap_or_else(|e| {
        warn!("Regex match error for pattern '{}': {}", pattern.as_str(), e);
        false
    })
}

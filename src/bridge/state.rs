//! Relay state resolved once Discord is ready.
//!
//! The initialization flow is:
//! 1. Configured channel ids are held until the gateway is ready
//! 2. On `ready()`, each id is fetched and turned into a [`BoundChannel`]
//! 3. The resulting [`ChannelBindings`] are handed to the orchestrator and
//!    never change for the rest of the session

use crate::bridge::router::LogicalChannel;

/// A Discord channel the relay can post to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundChannel {
    pub id: u64,
    pub name: String,
    /// Voice and stage channels can carry the population label.
    pub renamable: bool,
}

/// Logical channel to Discord channel mapping.
///
/// A `None` entry makes that route inert: renders are computed but never
/// sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelBindings {
    pub alerts: Option<BoundChannel>,
    pub logs: Option<BoundChannel>,
    pub chat: Option<BoundChannel>,
    pub status: Option<BoundChannel>,
}

impl ChannelBindings {
    pub fn get(&self, channel: LogicalChannel) -> Option<&BoundChannel> {
        match channel {
            LogicalChannel::Alerts => self.alerts.as_ref(),
            LogicalChannel::Logs => self.logs.as_ref(),
            LogicalChannel::Chat => self.chat.as_ref(),
            LogicalChannel::Status => self.status.as_ref(),
        }
    }

    /// Number of logical channels that resolved.
    pub fn bound_count(&self) -> usize {
        [&self.alerts, &self.logs, &self.chat, &self.status]
            .iter()
            .filter(|c| c.is_some())
            .count()
    }
}

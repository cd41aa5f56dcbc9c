//! Relay channel management.
//!
//! Groups the channels that connect the RCon client, the Discord side and
//! shutdown coordination.

use tokio::sync::{mpsc, watch};

use crate::common::RconEvent;
use crate::protocol::battleye::{RconHandle, RconRequest};

/// Channels owned by the RCon client task.
pub struct RconChannels {
    /// Sender for events (RCon -> relay).
    pub events_tx: mpsc::UnboundedSender<RconEvent>,
    /// Receiver for requests (relay/commands -> RCon).
    pub requests_rx: mpsc::UnboundedReceiver<RconRequest>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels used by the Discord side.
pub struct DiscordSideChannels {
    /// Receiver for RCon events.
    pub events_rx: mpsc::UnboundedReceiver<RconEvent>,
    /// Handle for sending requests to the RCon client.
    pub rcon: RconHandle,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
}

/// Bundle of all channels created for the relay.
pub struct ChannelBundle {
    pub rcon: RconChannels,
    pub discord: DiscordSideChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            rcon: RconChannels {
                events_tx,
                requests_rx,
                shutdown_rx: shutdown_rx.clone(),
            },
            discord: DiscordSideChannels {
                events_rx,
                rcon: RconHandle::new(requests_tx),
                shutdown_rx,
            },
            control: ControlChannels { shutdown_tx },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}

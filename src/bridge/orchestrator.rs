//! Relay orchestrator that ties the RCon stream to Discord.
//!
//! Consumes [`RconEvent`]s in order, classifies each line, routes the
//! result and performs the outbound actions. Every outbound action is
//! isolated: a failed send or rename is logged and the next line is
//! processed as usual.

use tracing::{debug, info, warn};

use crate::bridge::classifier::{Classification, EventKind, LineClassifier, ServerEvent};
use crate::bridge::population::PopulationTracker;
use crate::bridge::router::{self, LogicalChannel, RenderedMessage, Rendering};
use crate::bridge::state::{BoundChannel, ChannelBindings};
use crate::common::error::{RelayError, RelayResult};
use crate::common::{PresenceStatus, RconEvent};
use crate::protocol::battleye::RconHandle;

/// Outbound side of the relay.
#[serenity::async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, channel: &BoundChannel, rendering: &Rendering) -> RelayResult<()>;

    /// Rename a channel. Only voice and stage channels accept this.
    async fn rename(&self, channel: &BoundChannel, name: &str) -> RelayResult<()>;

    /// Best effort; failures are not reported.
    async fn set_presence(&self, status: PresenceStatus);
}

pub struct RelayOrchestrator<S: ChatSink> {
    sink: S,
    bindings: ChannelBindings,
    classifier: LineClassifier,
    tracker: PopulationTracker,
    rcon: RconHandle,
    mirror_to_logs: bool,
}

impl<S: ChatSink> RelayOrchestrator<S> {
    /// The population label is seeded from the status channel's current name.
    pub fn new(
        sink: S,
        bindings: ChannelBindings,
        classifier: LineClassifier,
        status_format: &str,
        rcon: RconHandle,
        mirror_to_logs: bool,
    ) -> Self {
        let initial_label = bindings.status.as_ref().map(|c| c.name.clone());
        Self {
            sink,
            bindings,
            classifier,
            tracker: PopulationTracker::new(status_format, initial_label),
            rcon,
            mirror_to_logs,
        }
    }

    /// Swap the sink after a gateway reconnect; bindings and population
    /// state are kept.
    pub fn replace_sink(&mut self, sink: S) {
        self.sink = sink;
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &PopulationTracker {
        &self.tracker
    }

    pub async fn handle_event(&mut self, event: RconEvent) {
        match event {
            RconEvent::Connected => {
                info!("RCon connected");
                self.sink.set_presence(PresenceStatus::Online).await;
            }
            RconEvent::Disconnected => {
                info!("RCon disconnected");
                self.sink.set_presence(PresenceStatus::DoNotDisturb).await;
            }
            RconEvent::Error(message) => {
                warn!("BattlEye error: {}", message);
                self.sink.set_presence(PresenceStatus::DoNotDisturb).await;
                self.report_error(&message).await;
            }
            RconEvent::Message(line) => {
                info!("{}", line);
                self.handle_line(&line).await;
            }
        }
    }

    /// Classify one server line and perform the resulting actions.
    pub async fn handle_line(&mut self, line: &str) {
        let event = match self.classifier.classify(line) {
            Classification::Suppressed => {
                debug!("Suppressed server line: {}", line);
                return;
            }
            Classification::Event(event) => event,
        };

        match &event.kind {
            EventKind::PopulationReport { count } => {
                self.update_population(*count).await;
                return;
            }
            EventKind::PlayerConnected { player_label } => {
                debug!("Player joined: {}", player_label);
            }
            EventKind::PlayerDisconnected { player_label } => {
                debug!("Player left: {}", player_label);
            }
            _ => {}
        }

        if let Some(rendered) = router::route(&event) {
            self.deliver(&rendered).await;

            if self.mirror_to_logs {
                if let Some(mirrored) = router::mirror_to_logs(&event, &rendered) {
                    self.deliver(&mirrored).await;
                }
            }
        }

        self.follow_up(&event);
    }

    /// Post plain text to the logs channel.
    /// Post an error embed to the logs channel.
    pub async fn report_error(&self, message: &str) {
        self.deliver(&router::render_error(message)).await;
    }

    pub async fn post_to_logs(&self, text: &str) {
        self.deliver(&router::render_log(text)).await;
    }

    pub async fn set_presence(&self, status: PresenceStatus) {
        self.sink.set_presence(status).await;
    }

    async fn deliver(&self, message: &RenderedMessage) {
        let Some(channel) = self.bindings.get(message.target) else {
            debug!("No {} channel bound, skipping send", message.target);
            return;
        };

        if let Err(e) = self.sink.send(channel, &message.rendering).await {
            warn!(
                "Failed to send to {} channel '{}': {}",
                message.target, channel.name, e
            );
        }
    }

    fn follow_up(&self, event: &ServerEvent) {
        if let Some(command) = router::follow_up_command(event) {
            debug!("Requesting '{}' after: {}", command, event.raw);
            if let Err(e) = self.rcon.send_command_detached(command) {
                warn!("Failed to queue RCon command '{}': {}", command, e);
            }
        }
    }

    async fn update_population(&mut self, count: u32) {
        let Some(channel) = self.bindings.get(LogicalChannel::Status) else {
            debug!("No status channel bound, ignoring population of {}", count);
            return;
        };

        let Some(update) = self.tracker.observe(count) else {
            debug!("Population label unchanged ({})", count);
            return;
        };

        let result = if channel.renamable {
            self.sink.rename(channel, &update.label).await
        } else {
            Err(RelayError::NotRenamable {
                channel: channel.name.clone(),
            })
        };

        match result {
            Ok(()) => {
                info!("Status channel renamed to '{}'", update.label);
                self.tracker.apply(&update);
            }
            Err(e) => warn!("Failed to update population label: {}", e),
        }
    }
}

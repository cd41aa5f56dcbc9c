//! Discord event handling.
//!
//! Owns the relay orchestrator once the gateway is ready and dispatches
//! Discord and RCon events to it.

use serenity::all::{ActivityData, Context, Interaction, Ready};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::bridge::{LineClassifier, LineFilter, RelayOrchestrator};
use crate::common::RconEvent;
use crate::config::types::Config;
use crate::discord::commands::{register_commands, CommandHandler};
use crate::discord::sink::{resolve_bindings, DiscordSink};
use crate::protocol::battleye::RconHandle;

pub struct RelayHandler {
    config: Config,
    rcon: RconHandle,
    activity: Option<ActivityData>,
    register_commands: bool,
    commands_registered: bool,
    command_handler: CommandHandler,
    orchestrator: Option<RelayOrchestrator<DiscordSink>>,
    /// Fired once the first `ready` has resolved the channel bindings.
    init_complete_tx: Option<oneshot::Sender<()>>,
}

impl RelayHandler {
    pub fn new(
        config: Config,
        rcon: RconHandle,
        activity: Option<ActivityData>,
        register_commands: bool,
        init_complete_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            command_handler: CommandHandler::new(rcon.clone()),
            config,
            rcon,
            activity,
            register_commands,
            commands_registered: false,
            orchestrator: None,
            init_complete_tx: Some(init_complete_tx),
        }
    }

    /// Whether RCon events can be relayed yet.
    pub fn is_ready(&self) -> bool {
        self.orchestrator.is_some()
    }

    pub async fn handle_ready(&mut self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        if self.register_commands && !self.commands_registered {
            match register_commands(&ctx.http, self.config.discord.guild_id).await {
                Ok(()) => self.commands_registered = true,
                Err(e) => error!("Failed to register slash commands: {}", e),
            }
        }

        let sink = DiscordSink::new(ctx.http.clone(), ctx.shard.clone(), self.activity.clone());

        match self.orchestrator.as_mut() {
            Some(orchestrator) => {
                debug!("Discord reconnected, keeping channel bindings");
                orchestrator.replace_sink(sink);
            }
            None => {
                info!("Resolving Discord channels...");
                let bindings = resolve_bindings(&ctx.http, &self.config.channels).await;
                info!("Resolved {} of 4 relay channels", bindings.bound_count());

                let filter = LineFilter::from_config(self.config.filters.as_ref());
                self.orchestrator = Some(RelayOrchestrator::new(
                    sink,
                    bindings,
                    LineClassifier::new(filter),
                    &self.config.relay.status_format,
                    self.rcon.clone(),
                    self.config.relay.mirror_to_logs,
                ));
            }
        }

        if let Some(tx) = self.init_complete_tx.take() {
            if tx.send(()).is_err() {
                warn!("Discord init signal receiver dropped");
            }
        }
    }

    pub async fn handle_interaction(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        if !self
            .command_handler
            .handle(&ctx, &command, self.orchestrator.as_ref())
            .await
        {
            debug!("Ignoring unknown command /{}", command.data.name);
        }
    }

    /// Surface a Discord client failure in the logs channel.
    pub async fn handle_client_error(&self, message: &str) {
        match self.orchestrator.as_ref() {
            Some(orchestrator) => orchestrator.report_error(message).await,
            None => debug!("Discord error before channels were resolved: {}", message),
        }
    }

    pub async fn handle_rcon_event(&mut self, event: RconEvent) {
        match self.orchestrator.as_mut() {
            Some(orchestrator) => orchestrator.handle_event(event).await,
            None => debug!("Dropping RCon event - Discord not ready: {:?}", event),
        }
    }
}

//! Discord bot client abstraction.
//!
//! Provides a high-level interface for creating and running the Discord bot,
//! hiding serenity implementation details from the rest of the application.

use std::time::Duration;

use backon::BackoffBuilder;
use serenity::all::{ActivityData, Interaction, OnlineStatus};
use serenity::async_trait;
use serenity::http::HttpBuilder;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::common::RconEvent;
use crate::config::types::Config;
use crate::discord::handler::RelayHandler;
use crate::protocol::battleye::RconHandle;

/// Activity shown until configured otherwise.
pub const DEFAULT_ACTIVITY: &str = "Buzz, Buzz…";

#[derive(Debug, Clone)]
pub enum DiscordBotEvent {
    /// Bot connected and ready.
    Ready { context: Context, ready: Ready },
    /// Slash command or other interaction.
    Interaction {
        context: Context,
        interaction: Interaction,
    },
    /// Gateway client failed; carries the error text.
    Error(String),
    Disconnected,
}

struct DiscordBotEvents {
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
}

impl DiscordBotEvents {
    fn new(discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>) -> Self {
        Self { discord_events_tx }
    }
}

#[async_trait]
impl EventHandler for DiscordBotEvents {
    async fn ready(&self, context: Context, ready: Ready) {
        if let Err(error) = self
            .discord_events_tx
            .send(DiscordBotEvent::Ready { context, ready })
        {
            warn!("Failed to process discord event: {}", error);
        }
    }

    async fn interaction_create(&self, context: Context, interaction: Interaction) {
        if let Err(error) = self.discord_events_tx.send(DiscordBotEvent::Interaction {
            context,
            interaction,
        }) {
            warn!("Failed to process discord event: {}", error);
        }
    }
}

/// Channels for Discord bot communication.
pub struct DiscordChannels {
    /// Receiver for RCon events.
    pub rcon_events_rx: mpsc::UnboundedReceiver<RconEvent>,
    /// Handle used by slash commands and follow-up requests.
    pub rcon: RconHandle,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Builder for creating the Discord bot.
pub struct DiscordBotBuilder {
    config: Config,
    channels: DiscordChannels,
    register_commands: bool,
}

impl DiscordBotBuilder {
    pub fn new(config: Config, channels: DiscordChannels) -> Self {
        let register_commands = config.discord.register_commands;
        Self {
            config,
            channels,
            register_commands,
        }
    }

    /// Register `/rcon` once the bot is ready.
    pub fn register_commands(mut self, register: bool) -> Self {
        self.register_commands = self.register_commands || register;
        self
    }

    /// Build the Discord bot.
    pub async fn build(self, init_complete_tx: oneshot::Sender<()>) -> anyhow::Result<DiscordBot> {
        let activity = ActivityData::custom(
            self.config
                .discord
                .activity
                .clone()
                .unwrap_or_else(|| DEFAULT_ACTIVITY.to_string()),
        );

        let (discord_events_tx, discord_events_rx) = mpsc::unbounded_channel::<DiscordBotEvent>();

        let token = self.config.discord.token.clone();
        let client = build_client(&token, &activity, discord_events_tx.clone()).await?;

        let handler = RelayHandler::new(
            self.config,
            self.channels.rcon,
            Some(activity.clone()),
            self.register_commands,
            init_complete_tx,
        );

        Ok(DiscordBot {
            client: Some(client),
            token,
            activity,
            handler,
            discord_events_rx,
            discord_events_tx,
            rcon_events_rx: self.channels.rcon_events_rx,
            shutdown_rx: self.channels.shutdown_rx,
        })
    }
}

async fn build_client(
    token: &str,
    activity: &ActivityData,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
) -> anyhow::Result<Client> {
    let intents = GatewayIntents::GUILDS;

    // Build a custom reqwest client with timeout settings
    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let http = HttpBuilder::new(token).client(reqwest_client).build();

    let events = DiscordBotEvents::new(discord_events_tx);
    let client = serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(events)
        .activity(activity.clone())
        .status(OnlineStatus::Idle)
        .await?;
    Ok(client)
}

/// Create an exponential backoff iterator for Discord reconnection.
/// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
fn discord_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(Duration::from_secs(300))
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

pub struct DiscordBot {
    client: Option<Client>,
    token: String,
    activity: ActivityData,
    handler: RelayHandler,
    discord_events_rx: mpsc::UnboundedReceiver<DiscordBotEvent>,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
    rcon_events_rx: mpsc::UnboundedReceiver<RconEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordBot {
    pub async fn run(mut self) {
        // Extract shard manager before we move client into run_connection
        let shard_manager = self.client.as_ref().map(|c| c.shard_manager.clone());
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::select! {
            _ = Self::run_connection(&mut self.client, &self.token, &self.activity, &self.discord_events_tx) => {},
            _ = Self::process_events(&mut self.discord_events_rx, &mut self.rcon_events_rx, &mut self.handler) => {},
            _ = async {
                // Wait for shutdown signal
                loop {
                    if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                // Gracefully shutdown Discord gateway
                if let Some(ref manager) = shard_manager {
                    info!("Initiating graceful Discord shutdown...");
                    manager.shutdown_all().await;
                    info!("Discord shutdown complete");
                }
            } => {}
        }
        info!("Discord task ended");
    }

    async fn run_connection(
        client: &mut Option<Client>,
        token: &str,
        activity: &ActivityData,
        discord_events_tx: &mpsc::UnboundedSender<DiscordBotEvent>,
    ) {
        let mut backoff = discord_backoff();

        loop {
            info!("Connecting to Discord...");

            let mut client = match client.take() {
                Some(client) => client,
                None => {
                    // serenity mostly handles reconnections itself.
                    match build_client(token, activity, discord_events_tx.clone()).await {
                        Ok(client) => {
                            backoff = discord_backoff();
                            client
                        }
                        Err(e) => {
                            error!("Failed to rebuild Discord client: {}", e);
                            let delay = backoff.next().unwrap_or(Duration::from_secs(300));
                            warn!("Retrying in {:.1}s...", delay.as_secs_f64());
                            sleep(delay).await;
                            continue;
                        }
                    }
                }
            };

            match client.start().await {
                Ok(()) => {
                    info!("Discord client disconnected normally");
                    if let Err(error) = discord_events_tx.send(DiscordBotEvent::Disconnected) {
                        warn!("Failed to process discord event: {}", error);
                    }
                    break;
                }
                Err(e) => {
                    error!("Discord client error: {}", e);
                    if let Err(error) = discord_events_tx
                        .send(DiscordBotEvent::Error(format!("Discord client error: {}", e)))
                    {
                        warn!("Failed to process discord event: {}", error);
                    }
                    let delay = backoff.next().unwrap_or(Duration::from_secs(300));
                    warn!(
                        "Discord disconnected. Reconnecting in {:.1}s...",
                        delay.as_secs_f64(),
                    );
                    if let Err(error) = discord_events_tx.send(DiscordBotEvent::Disconnected) {
                        warn!("Failed to process discord event: {}", error);
                    }
                    sleep(delay).await;
                }
            }
        }
    }

    async fn process_events(
        discord_events_rx: &mut mpsc::UnboundedReceiver<DiscordBotEvent>,
        rcon_events_rx: &mut mpsc::UnboundedReceiver<RconEvent>,
        handler: &mut RelayHandler,
    ) {
        loop {
            // RCon events stay queued until the channel bindings exist
            let relay_ready = handler.is_ready();

            tokio::select! {
                event = discord_events_rx.recv() => {
                    match event {
                        Some(DiscordBotEvent::Ready { context, ready }) => {
                            handler.handle_ready(context, ready).await;
                        }
                        Some(DiscordBotEvent::Interaction { context, interaction }) => {
                            handler.handle_interaction(context, interaction).await;
                        }
                        Some(DiscordBotEvent::Error(message)) => {
                            handler.handle_client_error(&message).await;
                        }
                        Some(DiscordBotEvent::Disconnected) => {
                            info!("Discord gateway disconnected");
                        }
                        None => {
                            debug!("Discord events channel closed.");
                            break;
                        }
                    }
                }

                event = rcon_events_rx.recv(), if relay_ready => {
                    match event {
                        Some(event) => handler.handle_rcon_event(event).await,
                        None => {
                            info!("RCon event channel closed");
                            break;
                        }
                    }
                }
            }
        }
    }
}

//! Serenity implementation of the relay's outbound side.

use std::sync::Arc;

use serenity::all::{
    ActivityData, ChannelId, ChannelType, CreateEmbed, CreateEmbedAuthor, CreateMessage,
    EditChannel, Http, OnlineStatus, ShardMessenger,
};
use tracing::{debug, info, warn};

use crate::bridge::orchestrator::ChatSink;
use crate::bridge::router::{EmbedSpec, LogicalChannel, Rendering};
use crate::bridge::state::{BoundChannel, ChannelBindings};
use crate::common::error::{RelayError, RelayResult};
use crate::common::PresenceStatus;
use crate::config::types::ChannelsConfig;

/// Posts to Discord channels and updates the bot presence.
#[derive(Clone)]
pub struct DiscordSink {
    http: Arc<Http>,
    shard: ShardMessenger,
    activity: Option<ActivityData>,
}

impl DiscordSink {
    pub fn new(http: Arc<Http>, shard: ShardMessenger, activity: Option<ActivityData>) -> Self {
        Self {
            http,
            shard,
            activity,
        }
    }
}

#[serenity::async_trait]
impl ChatSink for DiscordSink {
    async fn send(&self, channel: &BoundChannel, rendering: &Rendering) -> RelayResult<()> {
        let channel_id = ChannelId::new(channel.id);
        match rendering {
            Rendering::Embed(spec) => {
                let message = CreateMessage::new().embed(build_embed(spec));
                channel_id.send_message(&self.http, message).await?;
            }
            Rendering::Text(text) => {
                channel_id.say(&self.http, text).await?;
            }
        }
        Ok(())
    }

    async fn rename(&self, channel: &BoundChannel, name: &str) -> RelayResult<()> {
        if !channel.renamable {
            return Err(RelayError::NotRenamable {
                channel: channel.name.clone(),
            });
        }
        ChannelId::new(channel.id)
            .edit(&self.http, EditChannel::new().name(name))
            .await?;
        Ok(())
    }

    async fn set_presence(&self, status: PresenceStatus) {
        debug!("Setting presence to {:?}", status);
        self.shard
            .set_presence(self.activity.clone(), online_status(status));
    }
}

fn online_status(status: PresenceStatus) -> OnlineStatus {
    match status {
        PresenceStatus::Online => OnlineStatus::Online,
        PresenceStatus::Idle => OnlineStatus::Idle,
        PresenceStatus::DoNotDisturb => OnlineStatus::DoNotDisturb,
    }
}

fn build_embed(spec: &EmbedSpec) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .color(spec.color)
        .description(&spec.description);

    if let Some(name) = &spec.author {
        let mut author = CreateEmbedAuthor::new(name);
        if let Some(icon_url) = &spec.icon_url {
            author = author.icon_url(icon_url);
        }
        embed = embed.author(author);
    }
    if let Some(title) = &spec.title {
        embed = embed.title(title);
    }

    embed
}

/// Fetch every configured channel.
///
/// Channels that are not configured, cannot be fetched or are not guild
/// channels are left unbound.
pub async fn resolve_bindings(http: &Http, channels: &ChannelsConfig) -> ChannelBindings {
    ChannelBindings {
        alerts: resolve_channel(http, LogicalChannel::Alerts, channels.alerts).await,
        logs: resolve_channel(http, LogicalChannel::Logs, channels.logs).await,
        chat: resolve_channel(http, LogicalChannel::Chat, channels.chat).await,
        status: resolve_channel(http, LogicalChannel::Status, channels.status).await,
    }
}

async fn resolve_channel(
    http: &Http,
    logical: LogicalChannel,
    id: Option<u64>,
) -> Option<BoundChannel> {
    let Some(id) = id else {
        debug!("No {} channel configured", logical);
        return None;
    };

    let channel = match ChannelId::new(id).to_channel(http).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!("Failed to resolve {} channel {}: {}", logical, id, e);
            return None;
        }
    };

    let Some(channel) = channel.guild() else {
        warn!("{} channel {} is not a guild channel", logical, id);
        return None;
    };

    let renamable = matches!(channel.kind, ChannelType::Voice | ChannelType::Stage);
    if logical == LogicalChannel::Status && !renamable {
        warn!(
            "Status channel '{}' is not a voice or stage channel, population label will not be shown",
            channel.name
        );
    }

    info!("Resolved {} channel -> #{} ({})", logical, channel.name, id);
    Some(BoundChannel {
        id,
        name: channel.name,
        renamable,
    })
}

//! Discord `/rcon` slash command.
//!
//! Handles registration and execution of the administrative subcommands.

use serenity::all::{
    Command, CommandInteraction, CommandOptionType, Context, CreateCommand, CreateCommandOption,
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse, GuildId,
    Http, Permissions,
};
use tracing::{debug, info, warn};

use crate::bridge::orchestrator::{ChatSink, RelayOrchestrator};
use crate::common::error::RconResult;
use crate::common::{AdminCommand, PresenceStatus};
use crate::protocol::battleye::RconHandle;

pub const COMMAND_NAME: &str = "rcon";

/// Build the `/rcon` command definition.
pub fn rcon_command() -> CreateCommand {
    let mut command = CreateCommand::new(COMMAND_NAME)
        .description("BattlEye RCon commands.")
        .default_member_permissions(Permissions::ADMINISTRATOR);

    for admin_command in AdminCommand::all() {
        command = command.add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            admin_command.name(),
            admin_command.description(),
        ));
    }

    command
}

/// Register `/rcon` in a guild, or globally when no guild is given.
pub async fn register_commands(http: &Http, guild_id: Option<u64>) -> serenity::Result<()> {
    match guild_id {
        Some(guild_id) => {
            GuildId::new(guild_id)
                .set_commands(http, vec![rcon_command()])
                .await?;
            info!("Registered /{} in guild {}", COMMAND_NAME, guild_id);
        }
        None => {
            Command::set_global_commands(http, vec![rcon_command()]).await?;
            info!("Registered /{} globally", COMMAND_NAME);
        }
    }
    Ok(())
}

/// Executes `/rcon` interactions.
pub struct CommandHandler {
    rcon: RconHandle,
}

impl CommandHandler {
    pub fn new(rcon: RconHandle) -> Self {
        Self { rcon }
    }

    /// Handle an interaction. Returns `false` if it was not `/rcon`.
    pub async fn handle<S: ChatSink>(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        orchestrator: Option<&RelayOrchestrator<S>>,
    ) -> bool {
        if command.data.name != COMMAND_NAME {
            return false;
        }

        let subcommand = command.data.options.first().map(|o| o.name.as_str());
        info!(
            "/{} {} from {}",
            COMMAND_NAME,
            subcommand.unwrap_or("<none>"),
            command.user.name
        );

        if !is_admin(command) {
            reply_ephemeral(ctx, command, "You do not have permission to use this command.").await;
            return true;
        }

        let Some(admin_command) = subcommand.and_then(AdminCommand::from_subcommand) else {
            reply_ephemeral(ctx, command, "Unknown command.").await;
            return true;
        };

        // The interaction must be answered within 3 seconds
        if let Err(e) = command.defer_ephemeral(&ctx.http).await {
            warn!("Failed to defer interaction: {}", e);
        }

        match self.execute(admin_command, orchestrator).await {
            Ok(()) => {
                if let Err(e) = command.delete_response(&ctx.http).await {
                    debug!("Failed to delete deferred response: {}", e);
                }
            }
            Err(e) => {
                warn!("/{} {} failed: {}", COMMAND_NAME, admin_command.name(), e);
                let edit = EditInteractionResponse::new().content(e.to_string());
                if let Err(e) = command.edit_response(&ctx.http, edit).await {
                    warn!("Failed to reply to interaction: {}", e);
                }
            }
        }

        true
    }

    async fn execute<S: ChatSink>(
        &self,
        admin_command: AdminCommand,
        orchestrator: Option<&RelayOrchestrator<S>>,
    ) -> RconResult<()> {
        match admin_command {
            AdminCommand::Login => {
                self.rcon.login().await?;
                if let Some(orchestrator) = orchestrator {
                    orchestrator.set_presence(PresenceStatus::Online).await;
                }
            }
            AdminCommand::Logout => {
                self.rcon.logout().await?;
                if let Some(orchestrator) = orchestrator {
                    orchestrator.set_presence(PresenceStatus::Idle).await;
                    orchestrator.post_to_logs("RCon admin logged out").await;
                }
            }
            AdminCommand::Shutdown | AdminCommand::Players => {
                if let Some(server_command) = admin_command.server_command() {
                    self.rcon.send_command(server_command).await?;
                }
            }
        }
        Ok(())
    }
}

/// Default permissions hide the command, but they can be overridden per guild.
fn is_admin(command: &CommandInteraction) -> bool {
    command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .map(|permissions| permissions.administrator())
        .unwrap_or(false)
}

async fn reply_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );
    if let Err(e) = command.create_response(&ctx.http, response).await {
        warn!("Failed to reply to interaction: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;
    use tokio_test::assert_ok;

    use super::*;
    use crate::bridge::router::Rendering;
    use crate::bridge::state::{BoundChannel, ChannelBindings};
    use crate::bridge::LineClassifier;
    use crate::common::error::{RconError, RelayResult};
    use crate::config::types::DEFAULT_STATUS_FORMAT;
    use crate::protocol::battleye::RconRequest;

    #[derive(Clone, Default)]
    struct LogSink {
        sent: Arc<Mutex<Vec<(u64, Rendering)>>>,
        presence: Arc<Mutex<Vec<PresenceStatus>>>,
    }

    #[serenity::async_trait]
    impl ChatSink for LogSink {
        async fn send(&self, channel: &BoundChannel, rendering: &Rendering) -> RelayResult<()> {
            self.sent.lock().unwrap().push((channel.id, rendering.clone()));
            Ok(())
        }

        async fn rename(&self, _channel: &BoundChannel, _name: &str) -> RelayResult<()> {
            Ok(())
        }

        async fn set_presence(&self, status: PresenceStatus) {
            self.presence.lock().unwrap().push(status);
        }
    }

    fn handler() -> (CommandHandler, mpsc::UnboundedReceiver<RconRequest>) {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        (CommandHandler::new(RconHandle::new(requests_tx)), requests_rx)
    }

    /// Answer the next RCon request with `result` and name what was asked.
    async fn answer_next(
        requests_rx: &mut mpsc::UnboundedReceiver<RconRequest>,
        result: RconResult<()>,
    ) -> String {
        let (asked, reply) = match requests_rx.recv().await.unwrap() {
            RconRequest::Login { reply } => ("login".to_string(), reply),
            RconRequest::Logout { reply } => ("logout".to_string(), reply),
            RconRequest::Command { command, reply } => (command, reply),
        };
        reply.unwrap().send(result).unwrap();
        asked
    }

    const NO_RELAY: Option<&RelayOrchestrator<LogSink>> = None;

    #[tokio::test]
    async fn test_players_while_disconnected_fails() {
        let (handler, mut requests_rx) = handler();

        let (result, asked) = tokio::join!(
            handler.execute(AdminCommand::Players, NO_RELAY),
            answer_next(&mut requests_rx, Err(RconError::NotConnected)),
        );

        assert_eq!(asked, "players");
        let error = result.unwrap_err();
        assert!(matches!(error, RconError::NotConnected));
        assert_eq!(error.to_string(), "Not connected to the RCon server");
    }

    #[tokio::test]
    async fn test_shutdown_sends_server_shutdown() {
        let (handler, mut requests_rx) = handler();

        let (result, asked) = tokio::join!(
            handler.execute(AdminCommand::Shutdown, NO_RELAY),
            answer_next(&mut requests_rx, Ok(())),
        );

        assert_ok!(result);
        assert_eq!(asked, "#shutdown");
    }

    #[tokio::test]
    async fn test_client_gone_reported() {
        let (handler, requests_rx) = handler();
        drop(requests_rx);

        let result = handler.execute(AdminCommand::Login, NO_RELAY).await;
        assert!(matches!(result, Err(RconError::ClientGone)));
    }

    #[tokio::test]
    async fn test_logout_idles_and_posts_to_logs() {
        let (handler, mut requests_rx) = handler();
        let (relay_tx, _relay_rx) = mpsc::unbounded_channel();

        let sink = LogSink::default();
        let bindings = ChannelBindings {
            logs: Some(BoundChannel {
                id: 2,
                name: "logs".to_string(),
                renamable: false,
            }),
            ..Default::default()
        };
        let orchestrator = RelayOrchestrator::new(
            sink.clone(),
            bindings,
            LineClassifier::default(),
            DEFAULT_STATUS_FORMAT,
            RconHandle::new(relay_tx),
            false,
        );

        let (result, asked) = tokio::join!(
            handler.execute(AdminCommand::Logout, Some(&orchestrator)),
            answer_next(&mut requests_rx, Ok(())),
        );

        assert_ok!(result);
        assert_eq!(asked, "logout");
        assert_eq!(*sink.presence.lock().unwrap(), vec![PresenceStatus::Idle]);

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 2);
        match &sent[0].1 {
            Rendering::Embed(embed) => assert_eq!(embed.description, "RCon admin logged out"),
            other => panic!("unexpected rendering {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_sets_online() {
        let (handler, mut requests_rx) = handler();
        let (relay_tx, _relay_rx) = mpsc::unbounded_channel();
        let sink = LogSink::default();
        let orchestrator = RelayOrchestrator::new(
            sink.clone(),
            ChannelBindings::default(),
            LineClassifier::default(),
            DEFAULT_STATUS_FORMAT,
            RconHandle::new(relay_tx),
            false,
        );

        let (result, asked) = tokio::join!(
            handler.execute(AdminCommand::Login, Some(&orchestrator)),
            answer_next(&mut requests_rx, Ok(())),
        );

        assert_ok!(result);
        assert_eq!(asked, "login");
        assert_eq!(*sink.presence.lock().unwrap(), vec![PresenceStatus::Online]);
    }
}

//! Zombee - BattlEye RCon to Discord relay
//!
//! Keeps an RCon session with a game server and relays player joins,
//! chat, admin events and the player count to Discord channels.

mod bridge;
mod common;
mod config;
mod discord;
mod protocol;

use anyhow::Result;
use tokio::signal;
use tracing::{debug, error, info, warn};

use bridge::ChannelBundle;
use config::{env::get_config_path, load_and_validate};
use discord::{DiscordBotBuilder, DiscordChannels};
use protocol::battleye::RconClient;

/// Command line options.
#[derive(Debug, Default)]
struct Args {
    /// Register the `/rcon` slash command on startup.
    register_commands: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--register" | "-r" => args.register_commands = true,
            "--help" | "-h" => {
                println!("Usage: zombee [--register|-r]");
                println!();
                println!("  -r, --register   Register the /rcon slash command on startup");
                println!();
                println!("Configuration is read from $ZOMBEE_CONFIG (default: zombee.conf)");
                println!("and ZOMBEE_* environment variables.");
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
    }

    args
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = parse_args();

    info!("Zombee v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Set ZOMBEE_* environment variables or provide {}.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!(
        "  BattlEye RCon: {}:{}",
        config.battleye.address, config.battleye.port
    );
    info!(
        "  Slash commands: {}",
        if args.register_commands || config.discord.register_commands {
            "register on ready"
        } else {
            "not registered"
        }
    );

    // ============================================================
    // Create channels for communication
    // ============================================================
    let channels = ChannelBundle::new();

    let discord_channels = DiscordChannels {
        rcon_events_rx: channels.discord.events_rx,
        rcon: channels.discord.rcon,
        shutdown_rx: channels.discord.shutdown_rx,
    };

    // Create a one-shot channel to signal when Discord initialization is complete
    let (init_complete_tx, init_complete_rx) = tokio::sync::oneshot::channel::<()>();

    let discord_bot = DiscordBotBuilder::new(config.clone(), discord_channels)
        .register_commands(args.register_commands)
        .build(init_complete_tx)
        .await?;

    // ============================================================
    // Start Discord bot
    // ============================================================
    info!("Starting Discord bot...");

    // The RCon client starts only after channel bindings are resolved, so
    // the first server lines already have somewhere to go.
    let mut discord_task = tokio::spawn(async move {
        discord_bot.run().await;
    });

    info!("Waiting for Discord to connect and resolve channels...");
    // Wait for Discord initialization to complete (or timeout after 15s)
    let discord_init_success = match tokio::time::timeout(
        tokio::time::Duration::from_secs(15),
        init_complete_rx,
    )
    .await
    {
        Ok(Ok(())) => {
            info!("Discord initialization complete! Starting RCon client...");
            true
        }
        Ok(Err(_)) => {
            error!("Discord init signal sender was dropped before firing - initialization failed");
            false
        }
        Err(_) => {
            error!("Timed out waiting for Discord initialization (15s) - initialization failed");
            false
        }
    };

    if !discord_init_success {
        error!("Failed to initialize Discord client - shutting down");
        // Give a moment for error logs to flush
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
        std::process::exit(1);
    }

    // ============================================================
    // Start RCon client in separate task
    // ============================================================
    let shutdown_tx = channels.control.shutdown_tx;
    let rcon_client = RconClient::new(
        config.battleye.clone(),
        channels.rcon.events_tx,
        channels.rcon.requests_rx,
        channels.rcon.shutdown_rx,
    );
    let mut rcon_task = tokio::spawn(rcon_client.run());

    // ============================================================
    // Run both clients
    // ============================================================
    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - initiating graceful logout...");
            true
        }
        _ = &mut rcon_task => false,
        _ = &mut discord_task => false,
    };

    // Handle graceful shutdown
    if shutdown {
        // Fire-and-forget: if the channel is closed, both clients are already gone
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (clients already exited): {}", e);
        }
        let timeout = tokio::time::Duration::from_secs(5);
        match tokio::time::timeout(timeout, rcon_task).await {
            Ok(Ok(())) => info!("RCon client logged out gracefully"),
            Ok(Err(e)) => warn!("RCon client task panicked: {}", e),
            Err(_) => warn!("RCon client logout timed out"),
        }
        match tokio::time::timeout(timeout, discord_task).await {
            Ok(Ok(())) => debug!("Discord task finished"),
            Ok(Err(e)) => warn!("Discord task panicked: {}", e),
            Err(_) => warn!("Discord shutdown timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

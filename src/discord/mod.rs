//! Discord bot integration.
//!
//! This module provides the Discord side of the relay: the gateway client,
//! `/rcon` commands and the serenity-backed chat sink.

pub mod client;
pub mod commands;
pub mod handler;
pub mod sink;

pub use client::{DiscordBotBuilder, DiscordChannels};

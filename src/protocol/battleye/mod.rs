//! BattlEye RCon protocol (v2) over UDP.

pub mod client;
pub mod codec;
pub mod packets;

pub use client::{RconClient, RconHandle, RconRequest};

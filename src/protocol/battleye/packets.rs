//! BattlEye RCon packet definitions.
//!
//! Every datagram is `'B' 'E'`, a little-endian CRC32 of the remaining
//! bytes, `0xFF`, a packet type and a type-specific payload. This module
//! handles the part after the `0xFF` marker; the envelope lives in the codec.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::common::error::RconError;

/// Packet type bytes.
pub mod packet_types {
    pub const LOGIN: u8 = 0x00;
    pub const COMMAND: u8 = 0x01;
    pub const SERVER_MESSAGE: u8 = 0x02;
}

/// Trait for types that can be encoded into packet payload.
pub trait PacketEncode {
    fn encode(&self, buf: &mut BytesMut);
}

/// Trait for types that can be decoded from packet payload.
pub trait PacketDecode: Sized {
    type Error;
    fn decode(buf: &mut Bytes) -> Result<Self, Self::Error>;
}

/// Packets sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    Login { password: String },
    /// An empty command acts as a keep-alive.
    Command { seq: u8, command: String },
    /// Acknowledges a server message.
    Ack { seq: u8 },
}

impl PacketEncode for ClientPacket {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            ClientPacket::Login { password } => {
                buf.put_u8(packet_types::LOGIN);
                buf.put_slice(password.as_bytes());
            }
            ClientPacket::Command { seq, command } => {
                buf.put_u8(packet_types::COMMAND);
                buf.put_u8(*seq);
                buf.put_slice(command.as_bytes());
            }
            ClientPacket::Ack { seq } => {
                buf.put_u8(packet_types::SERVER_MESSAGE);
                buf.put_u8(*seq);
            }
        }
    }
}

/// Header present on command responses split across several datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartHeader {
    pub count: u8,
    pub index: u8,
}

/// Packets sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPacket {
    LoginResponse {
        success: bool,
    },
    CommandResponse {
        seq: u8,
        part: Option<MultipartHeader>,
        body: Bytes,
    },
    ServerMessage {
        seq: u8,
        message: String,
    },
}

impl PacketDecode for ServerPacket {
    type Error = RconError;

    fn decode(buf: &mut Bytes) -> Result<Self, Self::Error> {
        if !buf.has_remaining() {
            return Err(invalid("missing packet type"));
        }

        match buf.get_u8() {
            packet_types::LOGIN => {
                if !buf.has_remaining() {
                    return Err(invalid("login response without result"));
                }
                Ok(ServerPacket::LoginResponse {
                    success: buf.get_u8() == 0x01,
                })
            }
            packet_types::COMMAND => {
                if !buf.has_remaining() {
                    return Err(invalid("command response without sequence"));
                }
                let seq = buf.get_u8();

                // Multipart responses start with 0x00, part count, part index
                let part = if buf.remaining() >= 3 && buf[0] == 0x00 {
                    buf.advance(1);
                    let count = buf.get_u8();
                    let index = buf.get_u8();
                    if count == 0 || index >= count {
                        return Err(invalid("multipart index out of range"));
                    }
                    Some(MultipartHeader { count, index })
                } else {
                    None
                };

                Ok(ServerPacket::CommandResponse {
                    seq,
                    part,
                    body: buf.split_to(buf.remaining()),
                })
            }
            packet_types::SERVER_MESSAGE => {
                if !buf.has_remaining() {
                    return Err(invalid("server message without sequence"));
                }
                let seq = buf.get_u8();
                let message = String::from_utf8_lossy(&buf.split_to(buf.remaining())).into_owned();
                Ok(ServerPacket::ServerMessage { seq, message })
            }
            other => Err(invalid(&format!("unknown packet type {:#04x}", other))),
        }
    }
}

fn invalid(message: &str) -> RconError {
    RconError::InvalidPacket {
        message: message.to_string(),
    }
}

/// Collects the parts of a multipart command response.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    seq: Option<u8>,
    parts: Vec<Option<Bytes>>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part. Returns the full response text once every part arrived.
    ///
    /// A part for a different sequence number discards the incomplete
    /// response that was being collected.
    pub fn push(&mut self, seq: u8, header: MultipartHeader, body: Bytes) -> Option<String> {
        if self.seq != Some(seq) || self.parts.len() != header.count as usize {
            self.seq = Some(seq);
            self.parts = vec![None; header.count as usize];
        }

        self.parts[header.index as usize] = Some(body);

        if self.parts.iter().any(Option::is_none) {
            return None;
        }

        let mut full = BytesMut::new();
        for part in self.parts.drain(..).flatten() {
            full.put_slice(&part);
        }
        self.seq = None;

        Some(String::from_utf8_lossy(&full).into_owned())
    }
}

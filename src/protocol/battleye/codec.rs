//! Datagram codec for BattlEye RCon packets.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::common::error::RconError;
use crate::protocol::battleye::packets::{ClientPacket, PacketDecode, PacketEncode, ServerPacket};

/// `'B' 'E'` magic at the start of every datagram.
const MAGIC: &[u8; 2] = b"BE";
/// Marker byte that follows the checksum.
const MARKER: u8 = 0xFF;
/// Magic (2) + checksum (4) + marker (1) + packet type (1).
const MIN_PACKET_LEN: usize = 8;

/// Codec for BattlEye RCon datagrams.
///
/// Used with `UdpFramed`, so every call to `decode` sees exactly one
/// datagram.
#[derive(Debug, Default)]
pub struct BattlEyeCodec;

impl BattlEyeCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for BattlEyeCodec {
    type Item = ServerPacket;
    type Error = RconError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        // Take the whole datagram so a malformed one never lingers in the buffer
        let datagram = src.split();

        if datagram.len() < MIN_PACKET_LEN {
            return Err(RconError::InvalidPacket {
                message: format!("datagram too short ({} bytes)", datagram.len()),
            });
        }
        if &datagram[..2] != MAGIC {
            return Err(RconError::InvalidPacket {
                message: "missing BE header".to_string(),
            });
        }

        let expected = u32::from_le_bytes([datagram[2], datagram[3], datagram[4], datagram[5]]);
        let actual = crc32fast::hash(&datagram[6..]);
        if expected != actual {
            return Err(RconError::ChecksumMismatch { expected, actual });
        }

        if datagram[6] != MARKER {
            return Err(RconError::InvalidPacket {
                message: format!("unexpected marker byte {:#04x}", datagram[6]),
            });
        }

        let mut payload = datagram.freeze().split_off(7);
        ServerPacket::decode(&mut payload).map(Some)
    }
}

impl Encoder<ClientPacket> for BattlEyeCodec {
    type Error = RconError;

    fn encode(&mut self, item: ClientPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        body.put_u8(MARKER);
        item.encode(&mut body);

        dst.reserve(6 + body.len());
        dst.put_slice(MAGIC);
        dst.put_u32_le(crc32fast::hash(&body));
        dst.put_slice(&body);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wrap a packet body in the BE envelope the way the server does.
    fn frame(body: &[u8]) -> BytesMut {
        let mut payload = vec![MARKER];
        payload.extend_from_slice(body);

        let mut out = BytesMut::new();
        out.put_slice(MAGIC);
        out.put_u32_le(crc32fast::hash(&payload));
        out.put_slice(&payload);
        out
    }

    #[test]
    fn test_encode_login_envelope() {
        let mut codec = BattlEyeCodec::new();
        let mut dst = BytesMut::new();
        codec
            .encode(
                ClientPacket::Login {
                    password: "pw".to_string(),
                },
                &mut dst,
            )
            .unwrap();

        assert_eq!(&dst[..2], b"BE");
        assert_eq!(&dst[6..], &[0xFF, 0x00, b'p', b'w']);
        let crc = u32::from_le_bytes([dst[2], dst[3], dst[4], dst[5]]);
        assert_eq!(crc, crc32fast::hash(&dst[6..]));
    }

    #[test]
    fn test_decode_server_message() {
        let mut codec = BattlEyeCodec::new();
        let mut src = frame(b"\x02\x00Player #1 Alice disconnected");

        let packet = codec.decode(&mut src).unwrap();
        assert_eq!(
            packet,
            Some(ServerPacket::ServerMessage {
                seq: 0,
                message: "Player #1 Alice disconnected".to_string(),
            })
        );
        assert!(src.is_empty());
    }

    #[test]
    fn test_decode_empty_buffer() {
        let mut codec = BattlEyeCodec::new();
        let mut src = BytesMut::new();
        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_decode_checksum_mismatch_consumes_datagram() {
        let mut codec = BattlEyeCodec::new();
        let mut src = frame(b"\x00\x01");
        src[2] ^= 0xFF;

        assert!(matches!(
            codec.decode(&mut src),
            Err(RconError::ChecksumMismatch { .. })
        ));
        assert!(src.is_empty());
    }

    #[test]
    fn test_decode_rejects_foreign_datagram() {
        let mut codec = BattlEyeCodec::new();
        let mut src = BytesMut::from(&b"XX\x00\x00\x00\x00\xFF\x00\x01"[..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(RconError::InvalidPacket { .. })
        ));
    }

    #[test]
    fn test_decode_short_datagram() {
        let mut codec = BattlEyeCodec::new();
        let mut src = BytesMut::from(&b"BE\x00"[..]);
        assert!(codec.decode(&mut src).is_err());
    }
}

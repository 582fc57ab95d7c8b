//! Length-prefixed packet frames

use crate::error::{Result, TransportError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use pktlog_core::Packet;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame body (16 MiB)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Reserved frame name for session termination
pub const DISCONNECT: &str = "Disconnect";

const LEN_PREFIX: usize = 4;
const NAME_PREFIX: usize = 2;

/// A packet as it travels on the wire: a type name and an opaque payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// Packet type name
    pub name: String,
    /// Undecoded payload
    pub payload: Bytes,
}

impl RawPacket {
    /// Create a packet
    pub fn new(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

impl Packet for RawPacket {
    fn type_name(&self) -> &str {
        &self.name
    }
}

impl Serialize for RawPacket {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RawPacket", 3)?;
        state.serialize_field("type", &self.name)?;
        state.serialize_field("length", &(self.payload.len() as u64))?;
        state.serialize_field("payload", &hex::encode(&self.payload))?;
        state.end()
    }
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A relayed packet
    Packet(RawPacket),
    /// The sender is ending the session
    Disconnect(String),
}

impl Frame {
    fn parts(&self) -> (&str, &[u8]) {
        match self {
            Frame::Packet(packet) => (packet.name.as_str(), &packet.payload[..]),
            Frame::Disconnect(reason) => (DISCONNECT, reason.as_bytes()),
        }
    }

    /// Append the encoded frame, length prefix included
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        if let Frame::Packet(packet) = self {
            if packet.name.is_empty() {
                return Err(TransportError::invalid("empty packet type name"));
            }
            if packet.name == DISCONNECT {
                return Err(TransportError::invalid(format!(
                    "'{DISCONNECT}' is reserved for session termination"
                )));
            }
        }

        let (name, payload) = self.parts();
        let name_len = u16::try_from(name.len())
            .map_err(|_| TransportError::invalid("packet type name too long"))?;
        let body_len = NAME_PREFIX + name.len() + payload.len();
        if body_len > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge {
                size: body_len,
                max: MAX_FRAME_LEN,
            });
        }

        dst.reserve(LEN_PREFIX + body_len);
        // Fits: bounded by MAX_FRAME_LEN above.
        dst.put_u32(body_len as u32);
        dst.put_u16(name_len);
        dst.put_slice(name.as_bytes());
        dst.put_slice(payload);
        Ok(())
    }

    /// Decode a frame body (without its length prefix)
    pub fn decode(mut body: Bytes) -> Result<Self> {
        if body.len() < NAME_PREFIX {
            return Err(TransportError::invalid("frame body shorter than its header"));
        }
        let name_len = usize::from(body.get_u16());
        if name_len == 0 {
            return Err(TransportError::invalid("empty packet type name"));
        }
        if body.len() < name_len {
            return Err(TransportError::invalid(format!(
                "name length {name_len} exceeds remaining {} bytes",
                body.len()
            )));
        }

        let name = body.split_to(name_len);
        let name = std::str::from_utf8(&name)
            .map_err(|e| TransportError::invalid(format!("packet type name: {e}")))?;

        if name == DISCONNECT {
            let reason = String::from_utf8_lossy(&body).into_owned();
            return Ok(Frame::Disconnect(reason));
        }
        Ok(Frame::Packet(RawPacket::new(name, body)))
    }
}

/// Read one frame
///
/// A stream that ends before a frame completes yields
/// [`TransportError::Closed`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame> {
    let body_len = reader.read_u32().await.map_err(eof_as_closed)? as usize;
    if body_len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            size: body_len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = BytesMut::zeroed(body_len);
    reader.read_exact(&mut body).await.map_err(eof_as_closed)?;
    Frame::decode(body.freeze())
}

/// Write one frame and flush it
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<()> {
    let mut buf = BytesMut::new();
    frame.encode(&mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

fn eof_as_closed(e: std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::Closed
    } else {
        TransportError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(frame: &Frame) -> BytesMut {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        buf
    }

    // =========== Encoding Tests ===========

    #[test]
    fn test_encode_layout() {
        let buf = encoded(&Frame::Packet(RawPacket::new("TextPacket", vec![1u8, 2, 3])));

        assert_eq!(&buf[..4], &(2u32 + 10 + 3).to_be_bytes());
        assert_eq!(&buf[4..6], &10u16.to_be_bytes());
        assert_eq!(&buf[6..16], b"TextPacket");
        assert_eq!(&buf[16..], &[1, 2, 3]);
    }

    #[test]
    fn test_encode_rejects_reserved_name() {
        let mut buf = BytesMut::new();
        let frame = Frame::Packet(RawPacket::new(DISCONNECT, Bytes::new()));
        assert!(frame.encode(&mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_rejects_empty_name() {
        let mut buf = BytesMut::new();
        let frame = Frame::Packet(RawPacket::new("", Bytes::new()));
        assert!(frame.encode(&mut buf).is_err());
    }

    // =========== Decoding Tests ===========

    #[test]
    fn test_decode_packet() {
        let mut buf = encoded(&Frame::Packet(RawPacket::new("ActorEventPacket", vec![9u8])));
        let body = buf.split_off(4).freeze();

        assert_eq!(
            Frame::decode(body).unwrap(),
            Frame::Packet(RawPacket::new("ActorEventPacket", vec![9u8]))
        );
    }

    #[test]
    fn test_decode_disconnect() {
        let mut buf = encoded(&Frame::Disconnect("server full".into()));
        let body = buf.split_off(4).freeze();

        assert_eq!(
            Frame::decode(body).unwrap(),
            Frame::Disconnect("server full".into())
        );
    }

    #[test]
    fn test_decode_truncated() {
        assert!(Frame::decode(Bytes::from_static(&[0])).is_err());
        assert!(Frame::decode(Bytes::from_static(&[0, 8, b'A'])).is_err());
        assert!(Frame::decode(Bytes::from_static(&[0, 0])).is_err());
        assert!(Frame::decode(Bytes::from_static(&[0, 2, 0xff, 0xfe])).is_err());
    }

    // =========== Stream Tests ===========

    #[tokio::test]
    async fn test_read_rejects_oversized_frame() {
        let header = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        let mut reader = &header[..];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_eof_is_closed() {
        let mut empty: &[u8] = &[];
        assert!(matches!(
            read_frame(&mut empty).await,
            Err(TransportError::Closed)
        ));

        let mut partial: &[u8] = &[0, 0, 0, 10, 0, 4];
        assert!(matches!(
            read_frame(&mut partial).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_stream_preserves_order() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &Frame::Packet(RawPacket::new("A", vec![1u8])))
            .await
            .unwrap();
        write_frame(&mut wire, &Frame::Disconnect("bye".into()))
            .await
            .unwrap();

        let mut reader = wire.as_slice();
        assert!(matches!(read_frame(&mut reader).await.unwrap(), Frame::Packet(p) if p.name == "A"));
        assert_eq!(
            read_frame(&mut reader).await.unwrap(),
            Frame::Disconnect("bye".into())
        );
    }

    // =========== Rendering Tests ===========

    #[test]
    fn test_render_shows_type_and_hex_payload() {
        let packet = RawPacket::new("ActorEventPacket", vec![0xde_u8, 0xad]);
        let body = pktlog_core::observe::render(&packet).unwrap();

        assert!(body.contains("type = \"ActorEventPacket\""));
        assert!(body.contains("length = 2"));
        assert!(body.contains("payload = \"dead\""));
    }
}

//! pktlog transport layer
//!
//! Concrete [`Connection`](pktlog_core::Connection) over TCP.
//!
//! ## Wire format
//!
//! Every frame is a big-endian `u32` body length followed by the body:
//! a big-endian `u16` name length, the UTF-8 packet type name and the opaque
//! payload. A frame named [`DISCONNECT`] carries a UTF-8 reason instead of a
//! packet and ends the session.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub use error::{Result, TransportError};

pub mod frame;
pub use frame::{Frame, RawPacket, DISCONNECT, MAX_FRAME_LEN};

mod tcp;
pub use tcp::{PacketListener, TcpConnection};

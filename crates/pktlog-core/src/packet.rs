//! Packet abstraction
//!
//! The observation layer only needs two things from a packet: a type name to
//! classify against the filter, and a structured body to render when the
//! packet is observed. Payload bytes are otherwise opaque.

use serde::Serialize;
use std::fmt;

/// A relayed packet
///
/// Implementors are forwarded unmodified; `Serialize` is only used to render
/// the packet into the log when it matches the filter.
pub trait Packet: Serialize + Send + Sync + 'static {
    /// Type name matched against the filter entries (e.g. `ActorEventPacket`)
    fn type_name(&self) -> &str;
}

/// Direction of a packet flow through the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to remote endpoint
    Send,
    /// Remote endpoint to client
    Receive,
}

impl Direction {
    /// Both directions, in a fixed order
    pub const ALL: [Direction; 2] = [Direction::Send, Direction::Receive];

    /// Prefix used on every log line for this direction
    pub fn prefix(self) -> &'static str {
        match self {
            Direction::Send => "[Send] ",
            Direction::Receive => "[Receive] ",
        }
    }

    /// Lowercase name used in structured log fields
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Send => "send",
            Direction::Receive => "receive",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

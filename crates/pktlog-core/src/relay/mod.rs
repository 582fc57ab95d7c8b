//! Bidirectional packet relay
//!
//! Two loops per connection pair, one per [`Direction`]. Each reads from its
//! source, classifies the packet through the session's
//! [`DirectionContext`](crate::observe::DirectionContext) and forwards it
//! unmodified. When the first loop ends, the client is disconnected (with the
//! server's reason when there is one) and the server connection is closed,
//! so the other loop's pending read or write fails and it exits too.

pub mod memory;

use crate::error::{Error, Result};
use crate::observe::{DirectionContext, Session};
use crate::packet::{Direction, Packet};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// Reason given to the client when the session ends without a server reason
pub const CONNECTION_LOST: &str = "connection lost";

/// How long a failed server write waits for the server's disconnect reason
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

/// A packet connection to one relay endpoint
///
/// Read and write may be called concurrently from different tasks. `close`
/// must make pending and future reads and writes fail, and must be
/// idempotent.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Packet type carried by this connection
    type Packet: Packet;

    /// Wait for the next packet
    async fn read_packet(&self) -> Result<Self::Packet>;

    /// Send a packet
    async fn write_packet(&self, packet: Self::Packet) -> Result<()>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Tell the peer why the session ends, then close
    async fn disconnect(&self, _reason: &str) -> Result<()> {
        self.close().await
    }
}

/// Which operation ended a relay loop
#[derive(Debug)]
pub enum LegEnd {
    /// Reading from the source failed
    Read(Error),
    /// Writing to the destination failed
    Write(Error),
}

impl LegEnd {
    /// Underlying error
    pub fn error(&self) -> &Error {
        match self {
            LegEnd::Read(e) | LegEnd::Write(e) => e,
        }
    }
}

/// How a relayed session ended
#[derive(Debug)]
pub struct RelayOutcome {
    /// Client to server loop
    pub send: LegEnd,
    /// Server to client loop
    pub receive: LegEnd,
}

/// Forward packets from `source` to `destination` until an operation fails
///
/// Every packet is classified before it is written.
pub async fn forward<S, D>(source: &S, destination: &D, ctx: &DirectionContext) -> LegEnd
where
    S: Connection,
    D: Connection<Packet = S::Packet>,
{
    loop {
        let packet = match source.read_packet().await {
            Ok(packet) => packet,
            Err(e) => return LegEnd::Read(e),
        };

        ctx.observe(&packet);

        if let Err(e) = destination.write_packet(packet).await {
            return LegEnd::Write(e);
        }
    }
}

/// Relay between a client and a server connection until either side ends
///
/// If the server side ends with a disconnect reason, the client is
/// disconnected with that reason; otherwise with [`CONNECTION_LOST`].
pub async fn relay<C, S>(client: Arc<C>, server: Arc<S>, session: &Session) -> RelayOutcome
where
    C: Connection,
    S: Connection<Packet = C::Packet>,
{
    let mut upstream = spawn_leg(client.clone(), server.clone(), session.context(Direction::Send));
    let mut downstream =
        spawn_leg(server.clone(), client.clone(), session.context(Direction::Receive));

    let first = tokio::select! {
        end = &mut upstream => First::Send(leg_result(end, Direction::Send)),
        end = &mut downstream => First::Receive(leg_result(end, Direction::Receive)),
    };

    let (send, receive) = match first {
        First::Send(send) => {
            // A failed server write without a reason: the server's final
            // packet, if any, is still on the read side.
            let receive = if matches!(&send, LegEnd::Write(e) if e.disconnect_reason().is_none()) {
                tokio::time::timeout(DISCONNECT_GRACE, &mut downstream)
                    .await
                    .ok()
                    .map(|end| leg_result(end, Direction::Receive))
            } else {
                None
            };
            (Some(send), receive)
        }
        First::Receive(receive) => (None, Some(receive)),
    };

    let reason = server_reason(send.as_ref(), receive.as_ref())
        .unwrap_or(CONNECTION_LOST)
        .to_string();
    shut_down(client.as_ref(), server.as_ref(), &reason).await;

    let send = match send {
        Some(end) => end,
        None => leg_result(upstream.await, Direction::Send),
    };
    let receive = match receive {
        Some(end) => end,
        None => leg_result(downstream.await, Direction::Receive),
    };

    info!(
        send_end = %send.error(),
        receive_end = %receive.error(),
        reason = %reason,
        "Relay session ended"
    );

    RelayOutcome { send, receive }
}

enum First {
    Send(LegEnd),
    Receive(LegEnd),
}

fn spawn_leg<S, D>(
    source: Arc<S>,
    destination: Arc<D>,
    ctx: &Arc<DirectionContext>,
) -> JoinHandle<LegEnd>
where
    S: Connection,
    D: Connection<Packet = S::Packet>,
{
    let ctx = ctx.clone();
    tokio::spawn(async move { forward(source.as_ref(), destination.as_ref(), &ctx).await })
}

/// Disconnect reason reported by the server side of either loop
///
/// Only server reads (receive loop) and server writes (send loop) count;
/// client-side errors never carry a reason for the client.
fn server_reason<'a>(send: Option<&'a LegEnd>, receive: Option<&'a LegEnd>) -> Option<&'a str> {
    let from_write = match send {
        Some(LegEnd::Write(e)) => e.disconnect_reason(),
        _ => None,
    };
    let from_read = match receive {
        Some(LegEnd::Read(e)) => e.disconnect_reason(),
        _ => None,
    };
    from_read.or(from_write)
}

/// Tell the client why the session ended and release both connections
///
/// Closing both ends wakes whichever loop is still running.
async fn shut_down<C: Connection, S: Connection>(client: &C, server: &S, reason: &str) {
    debug!(reason, "Disconnecting client");
    if let Err(e) = client.disconnect(reason).await {
        debug!(error = %e, "Client already gone");
    }
    if let Err(e) = server.close().await {
        debug!(error = %e, "Failed to close server connection");
    }
}

fn leg_result(joined: std::result::Result<LegEnd, JoinError>, direction: Direction) -> LegEnd {
    match joined {
        Ok(end) => end,
        Err(e) => {
            warn!(direction = direction.as_str(), error = %e, "Relay loop task failed");
            LegEnd::Read(Error::ConnectionClosed)
        }
    }
}

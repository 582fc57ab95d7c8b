//! In-process connection pair
//!
//! Channel-backed [`Connection`] for embedding the relay in the same process
//! as its endpoints, and for tests.

use super::Connection;
use crate::error::{Error, Result};
use crate::packet::Packet;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

enum Message<P> {
    Packet(P),
    Disconnect(String),
}

/// Disconnect reason given by one end, visible to both
type ReasonSlot = Arc<Mutex<Option<String>>>;

/// One end of an in-memory connection
pub struct MemoryConnection<P> {
    tx: Mutex<Option<mpsc::UnboundedSender<Message<P>>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message<P>>>,
    closed: watch::Sender<bool>,
    sent_reason: ReasonSlot,
    peer_reason: ReasonSlot,
}

/// Create two connected ends
///
/// Packets written on one end are read from the other in order.
pub fn pair<P: Packet>() -> (MemoryConnection<P>, MemoryConnection<P>) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    let a_reason = ReasonSlot::default();
    let b_reason = ReasonSlot::default();
    (
        MemoryConnection::new(a_tx, a_rx, a_reason.clone(), b_reason.clone()),
        MemoryConnection::new(b_tx, b_rx, b_reason, a_reason),
    )
}

impl<P: Packet> MemoryConnection<P> {
    fn new(
        tx: mpsc::UnboundedSender<Message<P>>,
        rx: mpsc::UnboundedReceiver<Message<P>>,
        sent_reason: ReasonSlot,
        peer_reason: ReasonSlot,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            closed,
            sent_reason,
            peer_reason,
        }
    }

    /// Whether this end has been closed
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn mark_closed(&self) {
        self.closed.send_replace(true);
        // Dropping the sender ends the peer's reads once it drains what is queued.
        self.tx.lock().take();
        if let Ok(mut rx) = self.rx.try_lock() {
            rx.close();
        }
    }

    /// Error for an operation on a closed connection
    ///
    /// Carries the peer's reason once the peer has disconnected with one.
    fn closed_error(&self) -> Error {
        match self.peer_reason.lock().clone() {
            Some(reason) => Error::Disconnected { reason },
            None => Error::ConnectionClosed,
        }
    }

    fn send(&self, message: Message<P>) -> Result<()> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or_else(|| self.closed_error())?;
        tx.send(message).map_err(|_| self.closed_error())
    }
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

#[async_trait]
impl<P: Packet> Connection for MemoryConnection<P> {
    type Packet = P;

    async fn read_packet(&self) -> Result<P> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let mut rx = tokio::select! {
            rx = self.rx.lock() => rx,
            () = wait_closed(self.closed.subscribe()) => return Err(self.closed_error()),
        };

        let message = tokio::select! {
            message = rx.recv() => message,
            () = wait_closed(self.closed.subscribe()) => {
                rx.close();
                return Err(self.closed_error());
            }
        };

        match message {
            Some(Message::Packet(packet)) => Ok(packet),
            Some(Message::Disconnect(reason)) => {
                drop(rx);
                self.mark_closed();
                Err(Error::Disconnected { reason })
            }
            None => Err(self.closed_error()),
        }
    }

    async fn write_packet(&self, packet: P) -> Result<()> {
        self.send(Message::Packet(packet))
    }

    async fn close(&self) -> Result<()> {
        self.mark_closed();
        Ok(())
    }

    async fn disconnect(&self, reason: &str) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        *self.sent_reason.lock() = Some(reason.to_string());
        let sent = self.send(Message::Disconnect(reason.to_string()));
        self.mark_closed();
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::time::Duration;

    #[derive(Debug, Serialize, PartialEq)]
    struct Ping(u32);

    impl Packet for Ping {
        fn type_name(&self) -> &str {
            "PingPacket"
        }
    }

    #[tokio::test]
    async fn test_packets_arrive_in_order() {
        let (a, b) = pair::<Ping>();
        a.write_packet(Ping(1)).await.unwrap();
        a.write_packet(Ping(2)).await.unwrap();

        assert_eq!(b.read_packet().await.unwrap(), Ping(1));
        assert_eq!(b.read_packet().await.unwrap(), Ping(2));
    }

    #[tokio::test]
    async fn test_close_releases_pending_read() {
        let (a, _b) = pair::<Ping>();
        let a = std::sync::Arc::new(a);

        let reader = {
            let a = a.clone();
            tokio::spawn(async move { a.read_packet().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        a.close().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("read was not released")
            .unwrap();
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_peer_close_ends_reads() {
        let (a, b) = pair::<Ping>();
        a.write_packet(Ping(9)).await.unwrap();
        a.close().await.unwrap();

        assert_eq!(b.read_packet().await.unwrap(), Ping(9));
        assert!(matches!(b.read_packet().await, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_disconnect_carries_reason() {
        let (a, b) = pair::<Ping>();
        a.disconnect("server closed").await.unwrap();

        match b.read_packet().await {
            Err(Error::Disconnected { reason }) => assert_eq!(reason, "server closed"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(b.is_closed());
        assert!(a.write_packet(Ping(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_writes_after_peer_disconnect_carry_reason() {
        let (a, b) = pair::<Ping>();
        a.disconnect("server is restarting").await.unwrap();

        // b has not read the disconnect yet; its writes still see the reason.
        match b.write_packet(Ping(1)).await {
            Err(Error::Disconnected { reason }) => assert_eq!(reason, "server is restarting"),
            other => panic!("unexpected: {other:?}"),
        }

        b.close().await.unwrap();
        match b.read_packet().await {
            Err(Error::Disconnected { reason }) => assert_eq!(reason, "server is restarting"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_after_close_is_noop() {
        let (a, b) = pair::<Ping>();
        a.close().await.unwrap();
        a.disconnect("late").await.unwrap();

        assert!(matches!(b.read_packet().await, Err(Error::ConnectionClosed)));
    }
}

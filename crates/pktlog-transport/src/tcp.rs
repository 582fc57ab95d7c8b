//! TCP connections carrying framed packets

use crate::error::{is_disconnect, Result, TransportError};
use crate::frame::{read_frame, write_frame, Frame, RawPacket};
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use pktlog_core::Connection;
use std::net::SocketAddr;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

/// A framed packet connection over TCP
///
/// Reads and writes lock separate halves, so one task can wait for the next
/// packet while another writes.
pub struct TcpConnection {
    peer: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
    peer_reason: SyncMutex<Option<String>>,
}

impl TcpConnection {
    /// Wrap an established stream
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        let (closed, _) = watch::channel(false);

        Ok(Self {
            peer,
            reader: Mutex::new(BufReader::new(read)),
            writer: Mutex::new(write),
            closed,
            peer_reason: SyncMutex::new(None),
        })
    }

    /// Dial a remote endpoint
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let connection = Self::new(stream)?;
        debug!(peer = %connection.peer, "Connected");
        Ok(connection)
    }

    /// Address of the other end
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Whether this connection has been closed
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Error for an operation on a closed connection
    ///
    /// Once the peer has sent a disconnect, every later failure carries its
    /// reason.
    fn closed_error(&self) -> TransportError {
        match self.peer_reason.lock().clone() {
            Some(reason) => TransportError::Disconnected { reason },
            None => TransportError::Closed,
        }
    }

    async fn next_frame(&self) -> Result<Frame> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        tokio::select! {
            frame = async {
                let mut reader = self.reader.lock().await;
                read_frame(&mut *reader).await
            } => frame,
            () = wait_closed(self.closed.subscribe()) => Err(self.closed_error()),
        }
    }

    async fn send_frame(&self, frame: &Frame) -> Result<()> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        let sent = tokio::select! {
            sent = async {
                let mut writer = self.writer.lock().await;
                write_frame(&mut *writer, frame).await
            } => sent,
            () = wait_closed(self.closed.subscribe()) => Err(self.closed_error()),
        };
        sent.map_err(|e| match self.peer_reason.lock().clone() {
            Some(reason) => TransportError::Disconnected { reason },
            None => e,
        })
    }

    async fn shutdown(&self) -> Result<()> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        debug!(peer = %self.peer, "Closing connection");
        let mut writer = self.writer.lock().await;
        match writer.shutdown().await {
            Err(e) if !is_disconnect(e.kind()) => Err(e.into()),
            _ => Ok(()),
        }
    }
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

#[async_trait]
impl Connection for TcpConnection {
    type Packet = RawPacket;

    async fn read_packet(&self) -> pktlog_core::Result<RawPacket> {
        match self.next_frame().await? {
            Frame::Packet(packet) => Ok(packet),
            Frame::Disconnect(reason) => {
                debug!(peer = %self.peer, reason = %reason, "Peer sent disconnect");
                *self.peer_reason.lock() = Some(reason.clone());
                self.closed.send_replace(true);
                Err(TransportError::Disconnected { reason }.into())
            }
        }
    }

    async fn write_packet(&self, packet: RawPacket) -> pktlog_core::Result<()> {
        Ok(self.send_frame(&Frame::Packet(packet)).await?)
    }

    async fn close(&self) -> pktlog_core::Result<()> {
        Ok(self.shutdown().await?)
    }

    async fn disconnect(&self, reason: &str) -> pktlog_core::Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let sent = self.send_frame(&Frame::Disconnect(reason.to_string())).await;
        self.shutdown().await?;
        Ok(sent?)
    }
}

/// Accepts client connections
pub struct PacketListener {
    inner: TcpListener,
}

impl PacketListener {
    /// Bind to a local address
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        info!(address = %inner.local_addr()?, "Listening for clients");
        Ok(Self { inner })
    }

    /// Bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Wait for the next client
    pub async fn accept(&self) -> Result<TcpConnection> {
        let (stream, addr) = self.inner.accept().await?;
        debug!(peer = %addr, "Accepted client");
        TcpConnection::new(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pktlog_core::Error;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn connected() -> (TcpConnection, TcpConnection) {
        let listener = PacketListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, server) = tokio::join!(TcpConnection::connect(addr), listener.accept());
        (client.unwrap(), server.unwrap())
    }

    #[tokio::test]
    async fn test_packets_cross_the_wire() {
        let (client, server) = connected().await;

        client
            .write_packet(RawPacket::new("TextPacket", vec![1u8, 2]))
            .await
            .unwrap();
        let packet = server.read_packet().await.unwrap();

        assert_eq!(packet, RawPacket::new("TextPacket", vec![1u8, 2]));

        server
            .write_packet(RawPacket::new("ActorEventPacket", Vec::<u8>::new()))
            .await
            .unwrap();
        assert_eq!(client.read_packet().await.unwrap().name, "ActorEventPacket");
    }

    #[tokio::test]
    async fn test_disconnect_reason_reaches_peer() {
        let (client, server) = connected().await;

        server.disconnect("server full").await.unwrap();
        assert!(server.is_closed());

        match client.read_packet().await {
            Err(Error::Disconnected { reason }) => assert_eq!(reason, "server full"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(client.is_closed());

        match client.write_packet(RawPacket::new("TextPacket", vec![1u8])).await {
            Err(Error::Disconnected { reason }) => assert_eq!(reason, "server full"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_ends_peer_reads() {
        let (client, server) = connected().await;

        client.close().await.unwrap();
        client.close().await.unwrap();

        let result = timeout(Duration::from_secs(5), server.read_packet())
            .await
            .unwrap();
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_close_releases_pending_read() {
        let (client, _server) = connected().await;
        let client = std::sync::Arc::new(client);

        let reader = {
            let client = client.clone();
            tokio::spawn(async move { client.read_packet().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.close().await.unwrap();

        let result = timeout(Duration::from_secs(5), reader).await.unwrap().unwrap();
        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert!(client.write_packet(RawPacket::new("A", vec![0u8])).await.is_err());
    }
}

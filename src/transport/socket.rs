//! Non-blocking UDP socket wrapper and the engine's datagram sink.
//!
//! The session only ever touches the socket through `try_*` calls. Tokio
//! refreshes readiness when the calling task yields, so whoever drives the
//! session must await between iterations.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::arq::Output;

use super::frame::FrameCodec;

/// Connected UDP socket used by one session.
#[derive(Debug, Clone)]
pub struct SessionSocket {
    socket: Arc<UdpSocket>,
}

impl SessionSocket {
    /// Bind an ephemeral socket of the peer's address family and connect it.
    pub async fn connect_to(peer: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        Ok(Self::from_socket(socket))
    }

    /// Wrap an existing socket. It should already be connected to the peer.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket: Arc::new(socket),
        }
    }

    /// Wait until the socket is writable.
    pub async fn writable(&self) -> io::Result<()> {
        self.socket.writable().await
    }

    /// Wait until the socket is readable.
    pub async fn readable(&self) -> io::Result<()> {
        self.socket.readable().await
    }

    /// Receive one datagram without blocking.
    ///
    /// Returns `Ok(None)` if nothing is ready.
    pub fn try_recv(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.try_recv(buf) {
            Ok(len) => Ok(Some(len)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Send one datagram without blocking.
    ///
    /// Returns `Ok(None)` if the socket is not writable right now.
    pub fn try_send(&self, datagram: &[u8]) -> io::Result<Option<usize>> {
        match self.socket.try_send(datagram) {
            Ok(len) => Ok(Some(len)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Connected peer address.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }
}

/// Engine output: frames each datagram and sends it, fire-and-forget.
///
/// Failures are logged and the datagram is dropped; the engine recovers
/// through retransmission.
#[derive(Debug, Clone)]
pub struct DatagramSink {
    socket: SessionSocket,
    codec: FrameCodec,
}

impl DatagramSink {
    /// Create a sink writing to `socket` through `codec`.
    pub fn new(socket: SessionSocket, codec: FrameCodec) -> Self {
        Self { socket, codec }
    }
}

impl Output for DatagramSink {
    fn output(&mut self, datagram: &mut [u8]) {
        let len = datagram.len();
        if let Err(err) = self.codec.encode(datagram) {
            debug!(%err, "frame not sent");
            return;
        }

        match self.socket.try_send(datagram) {
            Ok(Some(sent)) => trace!(len = sent, "datagram sent"),
            Ok(None) => debug!(len, "socket not writable, datagram dropped"),
            Err(err) => debug!(%err, len, "datagram send failed"),
        }
    }
}

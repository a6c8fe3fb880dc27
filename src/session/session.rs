//! The session orchestrator.

use std::net::SocketAddr;
use std::sync::Arc;

use rand::Rng;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use crate::arq::{peek_conv, time_diff, ArqEngine, Kcp};
use crate::core::{BlockCrypt, MAX_RECV_PASSES};
use crate::transport::{Clock, DatagramSink, FrameCodec, SessionSocket};

use super::buffer::RecvBuffer;
use super::config::SessionConfig;
use super::error::SessionError;

/// Largest datagram `accept` will inspect.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// A reliable, optionally encrypted conversation with one UDP peer.
///
/// The session never blocks and owns no background task. Drive it from a
/// loop that awaits between iterations:
///
/// ```no_run
/// # async fn demo() -> Result<(), kcp_session::SessionError> {
/// use kcp_session::{Session, SessionConfig};
///
/// let mut session = Session::new(SessionConfig::default());
/// session.connect("127.0.0.1", 4000, None).await?;
///
/// let mut ticker = tokio::time::interval(std::time::Duration::from_millis(10));
/// let mut buf = [0u8; 1500];
/// session.send(b"hello")?;
/// loop {
///     ticker.tick().await;
///     session.update();
///     let n = session.recv(&mut buf)?;
///     if n > 0 {
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Session<A: ArqEngine<Output = DatagramSink> = Kcp<DatagramSink>> {
    config: SessionConfig,
    socket: Option<SessionSocket>,
    arq: Option<A>,
    codec: FrameCodec,
    recv_buffer: RecvBuffer,
    /// `None` means an engine tick is due immediately.
    next_update: Option<u32>,
    write_delay: bool,
    clock: Clock,
}

impl Session<Kcp<DatagramSink>> {
    /// Create a disconnected session over the bundled KCP engine.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_arq(config)
    }
}

impl<A: ArqEngine<Output = DatagramSink>> Session<A> {
    /// Create a disconnected session over engine type `A`.
    pub fn with_arq(config: SessionConfig) -> Self {
        Self {
            recv_buffer: RecvBuffer::with_capacity(config.recv_buffer_capacity),
            write_delay: config.write_delay,
            socket: None,
            arq: None,
            codec: FrameCodec::plain(),
            next_update: None,
            clock: Clock::new(),
            config,
        }
    }

    /// Resolve `host`, open a UDP socket towards it and start a conversation.
    ///
    /// `crypt` enables frame encryption; both peers must agree on it.
    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        crypt: Option<Arc<dyn BlockCrypt>>,
    ) -> Result<(), SessionError> {
        let peer = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| SessionError::Resolve(format!("{host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| SessionError::Resolve(format!("{host}:{port}: no addresses")))?;

        let socket = SessionSocket::connect_to(peer).await?;
        self.attach(socket, crypt, None).await
    }

    /// Start a conversation over a socket already connected to the peer.
    pub async fn connect_socket(
        &mut self,
        socket: UdpSocket,
        crypt: Option<Arc<dyn BlockCrypt>>,
    ) -> Result<(), SessionError> {
        self.attach(SessionSocket::from_socket(socket), crypt, None)
            .await
    }

    /// Wait for the first datagram on a bound socket and adopt its sender.
    ///
    /// The socket is connected to the sender and the conversation id is
    /// taken from the datagram, which stays queued for the first `recv`.
    /// Datagrams that fail to decode are discarded.
    pub async fn accept(
        &mut self,
        socket: UdpSocket,
        crypt: Option<Arc<dyn BlockCrypt>>,
    ) -> Result<SocketAddr, SessionError> {
        let codec = FrameCodec::new(crypt.clone());
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let (len, from) = socket.peek_from(&mut buf).await?;
            match codec.decode(&mut buf[..len]).ok().and_then(peek_conv) {
                Some(conv) => {
                    socket.connect(from).await?;
                    info!(%from, conv, "accepted peer");
                    self.attach(SessionSocket::from_socket(socket), crypt, Some(conv))
                        .await?;
                    return Ok(from);
                }
                None => {
                    debug!(%from, len, "discarding undecodable datagram");
                    socket.recv_from(&mut buf).await?;
                }
            }
        }
    }

    async fn attach(
        &mut self,
        socket: SessionSocket,
        crypt: Option<Arc<dyn BlockCrypt>>,
        conv: Option<u32>,
    ) -> Result<(), SessionError> {
        self.close();
        socket.writable().await?;

        let codec = FrameCodec::new(crypt);
        let conv = conv
            .or(self.config.conv)
            .unwrap_or_else(|| rand::thread_rng().gen_range(1..i32::MAX as u32));

        let sink = DatagramSink::new(socket.clone(), codec.clone());
        let mut arq = A::with_output(conv, &self.config.arq, sink)?;
        arq.reserve_bytes(codec.header_size())?;

        info!(
            conv,
            peer = ?socket.peer_addr().ok(),
            encrypted = codec.is_encrypted(),
            "session connected"
        );

        self.socket = Some(socket);
        self.arq = Some(arq);
        self.codec = codec;
        self.recv_buffer.clear();
        self.next_update = None;
        Ok(())
    }

    /// Release the socket and destroy the engine.
    ///
    /// Safe to call on a closed session.
    pub fn close(&mut self) {
        let was_connected = self.socket.take().is_some();
        if let Some(mut arq) = self.arq.take() {
            arq.clear();
        }
        self.recv_buffer.clear();
        self.next_update = None;
        if was_connected {
            info!("session closed");
        }
    }

    /// A socket is attached and the engine still considers the link alive.
    pub fn is_connected(&self) -> bool {
        self.socket.is_some() && self.arq.as_ref().is_some_and(|arq| !arq.is_dead_link())
    }

    /// Queue `data` for reliable delivery.
    ///
    /// Returns `Ok(0)` without queuing anything while the send window is
    /// full.
    pub fn send(&mut self, data: &[u8]) -> Result<usize, SessionError> {
        let (Some(_), Some(arq)) = (&self.socket, &mut self.arq) else {
            return Err(SessionError::NotConnected);
        };

        if arq.wait_snd() >= arq.send_window() {
            return Ok(0);
        }

        let accepted = arq
            .send(data)
            .inspect_err(|err| debug!(%err, len = data.len(), "send rejected"))?;
        self.next_update = None;

        if !self.write_delay || arq.wait_snd() >= arq.send_window() {
            arq.flush();
        }
        Ok(accepted)
    }

    /// Copy received application bytes into `data`.
    ///
    /// Serves leftover bytes from earlier datagrams first, then performs at
    /// most one non-blocking socket read. Returns `Ok(0)` when nothing is
    /// available. Frame errors mean the datagram was dropped; the session
    /// stays usable.
    pub fn recv(&mut self, data: &mut [u8]) -> Result<usize, SessionError> {
        for _ in 0..MAX_RECV_PASSES {
            if !self.recv_buffer.is_empty() {
                return Ok(self.recv_buffer.read_into(data));
            }

            let (Some(socket), Some(arq)) = (&self.socket, &mut self.arq) else {
                return Err(SessionError::NotConnected);
            };
            let buffer = &mut self.recv_buffer;
            buffer.ensure_writable(self.config.arq.mtu);

            let len = match socket.try_recv(buffer.writable_mut()) {
                Ok(Some(len)) => len,
                Ok(None) => return Ok(0),
                Err(err) => {
                    warn!(%err, "socket read failed");
                    return Err(err.into());
                }
            };
            if len == 0 {
                return Ok(0);
            }
            trace!(len, "datagram received");

            let input = match self.codec.decode(&mut buffer.writable_mut()[..len]) {
                Ok(datagram) => arq.input(datagram).map_err(|err| {
                    debug!(%err, len, "datagram rejected by engine");
                    SessionError::from(err)
                }),
                Err(err) => {
                    debug!(%err, len, "frame dropped");
                    Err(err.into())
                }
            };
            buffer.clear();
            input?;

            drain(arq, buffer);
            if buffer.is_empty() {
                return Ok(0);
            }
        }
        Ok(0)
    }

    /// Run the engine's timers if due, using the session clock.
    pub fn update(&mut self) {
        let now = self.clock.now_ms();
        self.update_at(now);
    }

    /// Run the engine's timers if due at `now` (wrapping milliseconds).
    pub fn update_at(&mut self, now: u32) {
        if self.socket.is_none() {
            return;
        }
        let Some(arq) = self.arq.as_mut() else {
            return;
        };
        if self.next_update.is_some_and(|due| time_diff(now, due) < 0) {
            return;
        }
        arq.update(now);
        self.next_update = Some(arq.check(now));
    }

    /// Milliseconds on the session clock.
    pub fn now_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    /// Enable or disable delayed flushing after `send`.
    pub fn set_write_delay(&mut self, enabled: bool) {
        self.write_delay = enabled;
    }

    /// Whether flushing after `send` is delayed.
    pub fn write_delay(&self) -> bool {
        self.write_delay
    }

    /// Bytes reserved at the front of each engine datagram (0 or 20).
    pub fn header_size(&self) -> usize {
        self.codec.header_size()
    }

    /// Configuration the session was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The engine, while connected.
    pub fn engine(&self) -> Option<&A> {
        self.arq.as_ref()
    }

    /// The engine, mutably, while connected.
    pub fn engine_mut(&mut self) -> Option<&mut A> {
        self.arq.as_mut()
    }

    /// Local socket address.
    pub fn local_addr(&self) -> Result<SocketAddr, SessionError> {
        let socket = self.socket.as_ref().ok_or(SessionError::NotConnected)?;
        Ok(socket.local_addr()?)
    }

    /// Peer socket address.
    pub fn peer_addr(&self) -> Result<SocketAddr, SessionError> {
        let socket = self.socket.as_ref().ok_or(SessionError::NotConnected)?;
        Ok(socket.peer_addr()?)
    }
}

impl<A: ArqEngine<Output = DatagramSink>> std::fmt::Debug for Session<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.is_connected())
            .field("codec", &self.codec)
            .field("buffered", &self.recv_buffer.len())
            .field("next_update", &self.next_update)
            .field("write_delay", &self.write_delay)
            .finish()
    }
}

/// Pull every complete message out of the engine into `buffer`.
///
/// Zero-length messages are consumed like any other.
fn drain<A: ArqEngine>(arq: &mut A, buffer: &mut RecvBuffer) {
    while let Some(size) = arq.peek_size() {
        buffer.ensure_writable(size);
        match arq.recv(buffer.writable_mut()) {
            Ok(n) => buffer.advance_write(n),
            Err(err) => {
                warn!(%err, size, "engine drain failed");
                break;
            }
        }
    }
}

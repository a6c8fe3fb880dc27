//! ARQ engine layer
//!
//! The session drives reliability through the [`ArqEngine`] trait and never
//! touches engine internals. The bundled engine, [`Kcp`], speaks the KCP
//! segment format so it interoperates with other KCP peers.
//!
//! # Architecture
//!
//! ```text
//!  Session ── send/recv/input/update ──▶ ArqEngine
//!                                           │ raw datagrams
//!                                           ▼
//!                                        Output (DatagramSink: frame codec + socket)
//! ```
//!
//! The engine owns its [`Output`]. Every datagram handed to it starts with
//! the number of bytes requested through [`ArqEngine::reserve_bytes`], which
//! the output is free to overwrite (the frame codec puts its header there).

mod config;
mod kcp;
mod segment;

pub use config::ArqConfig;
pub use kcp::{constants as kcp_constants, Kcp};
pub use segment::{peek_conv, Command, SegmentHeader, SEGMENT_HEADER_SIZE};

use crate::core::ArqError;

/// Sink for raw datagrams produced by an engine.
pub trait Output {
    /// Transmit one datagram.
    ///
    /// The buffer may be modified in place (e.g. encrypted) before sending.
    fn output(&mut self, datagram: &mut [u8]);
}

/// Reliable, ordered message delivery over an unreliable datagram channel.
///
/// Times are milliseconds on a wrapping 32-bit clock chosen by the caller.
pub trait ArqEngine {
    /// Sink type the engine writes raw datagrams to.
    type Output: Output;

    /// Create an engine for conversation `conv`, tuned by `config`.
    fn with_output(conv: u32, config: &ArqConfig, output: Self::Output) -> Result<Self, ArqError>
    where
        Self: Sized;

    /// Queue application bytes for reliable delivery.
    ///
    /// Returns the number of bytes accepted.
    fn send(&mut self, data: &[u8]) -> Result<usize, ArqError>;

    /// Pop the next fully reassembled message into `buf`.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, ArqError>;

    /// Feed one raw received datagram.
    fn input(&mut self, data: &[u8]) -> Result<usize, ArqError>;

    /// Size of the next fully reassembled message, if any.
    fn peek_size(&self) -> Option<usize>;

    /// Run time-driven retransmission and acknowledgment logic.
    fn update(&mut self, now: u32);

    /// Time at which [`update`](Self::update) must be called next.
    fn check(&self, now: u32) -> u32;

    /// Emit pending segments immediately.
    fn flush(&mut self);

    /// Leave `len` bytes at the front of every output datagram.
    fn reserve_bytes(&mut self, len: usize) -> Result<(), ArqError>;

    /// Segments waiting to be sent or acknowledged.
    fn wait_snd(&self) -> usize;

    /// Configured send window in segments.
    fn send_window(&self) -> usize;

    /// Whether the peer stopped acknowledging and the link is considered dead.
    fn is_dead_link(&self) -> bool;

    /// Drop all queued state.
    fn clear(&mut self);
}

/// Signed distance between two wrapping millisecond timestamps.
#[inline]
pub fn time_diff(later: u32, earlier: u32) -> i32 {
    later.wrapping_sub(earlier) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_diff_wraps() {
        assert_eq!(time_diff(10, 5), 5);
        assert_eq!(time_diff(5, 10), -5);
        assert_eq!(time_diff(3, u32::MAX - 1), 5);
        assert_eq!(time_diff(u32::MAX - 1, 3), -5);
    }
}

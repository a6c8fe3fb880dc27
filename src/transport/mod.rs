//! Transport layer
//!
//! Everything between the ARQ engine and the wire:
//!
//! - **Frame codec**: [`FrameCodec`] adds the checksum and encrypts whole
//!   datagrams, and reverses both on receipt
//! - **Sockets**: [`SessionSocket`] wraps a connected tokio UDP socket with
//!   non-blocking `try_*` calls
//! - **Engine output**: [`DatagramSink`] frames and sends what the engine emits
//! - **Clock**: [`Clock`] feeds the engine wrapping millisecond timestamps
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Session                      │
//! ├─────────────────────────────────────────┤
//! │            ARQ engine                   │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   CRC32, AES-CFB framing, UDP           │
//! ├─────────────────────────────────────────┤
//! │              UDP                        │
//! └─────────────────────────────────────────┘
//! ```

mod error;
mod frame;
mod socket;
mod timing;

pub use error::FrameError;
pub use frame::FrameCodec;
pub use socket::{DatagramSink, SessionSocket};
pub use timing::Clock;

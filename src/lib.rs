//! # kcp-session
//!
//! Reliable, optionally encrypted sessions over UDP.
//!
//! A session runs a KCP-compatible ARQ engine over a connected UDP socket
//! and wraps every datagram in a checksummed, AES-CFB encrypted frame:
//!
//! - **Reliability**: ordered delivery with retransmission and fast resend
//! - **Integrity**: CRC32 over each datagram, checked after decryption
//! - **Confidentiality**: AES-128/192/256 in CFB mode over whole frames
//! - **Poll-driven**: no background tasks; the caller drives `update`/`recv`
//!
//! ## Feature Flags
//!
//! - `transport` (default): Sockets, frame codec and sessions
//! - `crypto` (default): AES-CFB block cipher and key derivation
//!
//! ## Modules
//!
//! - [`core`]: Cipher trait, constants, and error types (always included)
//! - [`arq`]: ARQ engine contract and the bundled KCP engine (always included)
//! - [`crypto`]: Block cipher (requires `crypto` feature)
//! - [`transport`]: Frame codec, sockets, clock (requires `transport` feature)
//! - [`session`]: Session orchestrator (requires `transport` feature)
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use kcp_session::prelude::*;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let key = derive_key(b"shared secret", b"shared salt")?;
//! let crypt: Arc<dyn BlockCrypt> = Arc::new(AesBlockCrypt::new(&key)?);
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.connect("127.0.0.1", 4000, Some(crypt)).await?;
//! session.send(b"Hello KCP: 1")?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// ARQ engine (always included)
pub mod arq;

// Crypto layer (feature-gated)
#[cfg(feature = "crypto")]
#[cfg_attr(docsrs, doc(cfg(feature = "crypto")))]
pub mod crypto;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Sessions (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod session;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::arq::{ArqConfig, ArqEngine, Kcp, Output};

    #[cfg(feature = "transport")]
    pub use crate::transport::{Clock, DatagramSink, FrameCodec, FrameError, SessionSocket};

    #[cfg(feature = "transport")]
    pub use crate::session::{RecvBuffer, Session, SessionConfig, SessionConfigBuilder, SessionError};

    #[cfg(feature = "crypto")]
    pub use crate::crypto::*;
}

// Re-export commonly used items at crate root
pub use arq::{ArqConfig, ArqEngine};
pub use crate::core::{ArqError, BlockCrypt, CryptoError};

#[cfg(feature = "transport")]
pub use session::{Session, SessionConfig, SessionError};

#[cfg(feature = "transport")]
pub use transport::FrameError;

#[cfg(feature = "crypto")]
pub use crypto::{derive_key, AesBlockCrypt};

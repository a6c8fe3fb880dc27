//! Session layer
//!
//! A [`Session`] ties one UDP peer, one ARQ engine and one frame codec
//! together behind a poll-driven API:
//!
//! - `send` queues application bytes, honouring the engine's send window
//! - `recv` performs at most one socket read and drains every complete
//!   message into a growable [`RecvBuffer`]
//! - `update` runs the engine's timers when they are due
//!
//! # Lifecycle
//!
//! ```text
//!   Disconnected ── connect / connect_socket / accept ──▶ Connected
//!        ▲                                                   │
//!        └───────────── close (or dead link) ◀───────────────┘
//! ```

mod buffer;
mod config;
mod error;
#[allow(clippy::module_inception)]
mod session;

pub use buffer::RecvBuffer;
pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::SessionError;
pub use session::Session;

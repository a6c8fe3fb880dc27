//! Engine tuning profiles.

use super::kcp::constants;

/// ARQ tuning tuple passed through to the engine at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArqConfig {
    /// Aggressive RTO handling (lower minimum RTO, gentler backoff).
    pub nodelay: bool,

    /// Internal tick interval in milliseconds (clamped to 10..=5000).
    pub interval: u32,

    /// Fast retransmit after this many ACKs skip a segment (0 disables).
    pub resend: u32,

    /// Disable the congestion window.
    pub no_congestion_window: bool,

    /// Send window in segments.
    pub send_window: u16,

    /// Receive window in segments.
    pub recv_window: u16,

    /// Maximum datagram size, including any reserved header.
    pub mtu: usize,

    /// Flush ACKs immediately after input instead of on the next tick.
    pub ack_nodelay: bool,

    /// Transmissions of one segment after which the link is declared dead.
    pub dead_link: u32,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self::fast()
    }
}

impl ArqConfig {
    fn profile(nodelay: bool, interval: u32) -> Self {
        Self {
            nodelay,
            interval,
            resend: 2,
            no_congestion_window: true,
            send_window: constants::WND_SND,
            recv_window: constants::WND_RCV,
            mtu: constants::MTU_DEF,
            ack_nodelay: true,
            dead_link: constants::DEADLINK,
        }
    }

    /// Normal profile: `(0, 40, 2, 1)`.
    pub fn normal() -> Self {
        Self::profile(false, 40)
    }

    /// Fast profile: `(0, 30, 2, 1)`. The session default.
    pub fn fast() -> Self {
        Self::profile(false, 30)
    }

    /// Faster profile: `(1, 20, 2, 1)`.
    pub fn fast2() -> Self {
        Self::profile(true, 20)
    }

    /// Fastest profile: `(1, 10, 2, 1)`.
    pub fn fast3() -> Self {
        Self::profile(true, 10)
    }
}

//! Session configuration.

use crate::arq::ArqConfig;
use crate::core::RECV_BUFFER_CAPACITY;

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Engine tuning profile.
    pub arq: ArqConfig,

    /// Defer flushing after `send` until the send window fills or the next
    /// tick.
    pub write_delay: bool,

    /// Initial receive buffer capacity.
    pub recv_buffer_capacity: usize,

    /// Fixed conversation id. Random when unset.
    pub conv: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            arq: ArqConfig::fast(),
            write_delay: false,
            recv_buffer_capacity: RECV_BUFFER_CAPACITY,
            conv: None,
        }
    }
}

impl SessionConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine tuning profile.
    pub fn arq(mut self, arq: ArqConfig) -> Self {
        self.config.arq = arq;
        self
    }

    /// Enable or disable delayed flushing.
    pub fn write_delay(mut self, enabled: bool) -> Self {
        self.config.write_delay = enabled;
        self
    }

    /// Set the initial receive buffer capacity.
    pub fn recv_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.recv_buffer_capacity = capacity;
        self
    }

    /// Use a fixed conversation id.
    pub fn conv(mut self, conv: u32) -> Self {
        self.config.conv = Some(conv);
        self
    }

    /// Finish building.
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

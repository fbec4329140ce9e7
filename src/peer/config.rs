//! Orchestrator configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;

use crate::server::config::DEFAULT_LOCAL_PORT;

/// Payload of the connection handshake
pub const CONNECT_PAYLOAD: &[u8] = b"connect";

/// Orchestrator configuration options
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Passphrase protecting provisioned links
    pub passphrase: String,

    /// Handshake payload
    pub connect_payload: Bytes,

    /// Pause after a handshake is acknowledged before the next one
    pub settle_delay: Duration,

    /// Upper bound on waiting for a discovery operation
    pub attach_timeout: Duration,

    /// Listener for on-device players opened by `publish_service`
    pub local_addr: SocketAddr,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            passphrase: String::new(),
            connect_payload: Bytes::from_static(CONNECT_PAYLOAD),
            settle_delay: Duration::from_millis(500),
            attach_timeout: Duration::from_secs(10),
            local_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_LOCAL_PORT)),
        }
    }
}

impl OrchestratorConfig {
    /// Set the link passphrase
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = passphrase.into();
        self
    }

    /// Set the settle delay
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the attach timeout
    pub fn attach_timeout(mut self, timeout: Duration) -> Self {
        self.attach_timeout = timeout;
        self
    }

    /// Set the local listener address
    pub fn local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = addr;
        self
    }
}

//! Channel context
//!
//! Context passed to the protocol engine with every request, describing the
//! channel the request arrived on.

use std::fmt;
use std::net::SocketAddr;

use crate::peer::TransportHandle;

/// Identifier of an accepted control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Context passed to the engine for each request
///
/// Read-only view of the channel. The engine never touches the socket; the
/// server writes whatever response the engine returns.
#[derive(Debug, Clone)]
pub struct ChannelContext {
    /// Channel identifier
    pub id: ChannelId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Local address the channel was accepted on
    pub local_addr: SocketAddr,

    /// Isolated link the channel was accepted over, if any
    pub binding: Option<TransportHandle>,
}

impl ChannelContext {
    /// Create a context for a channel with no transport binding
    pub fn new(id: ChannelId, peer_addr: SocketAddr, local_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            local_addr,
            binding: None,
        }
    }

    /// Attach a transport binding
    pub fn with_binding(mut self, binding: Option<TransportHandle>) -> Self {
        self.binding = binding;
        self
    }
}

//! Link provisioning interface
//!
//! Provisioning an isolated link is asynchronous: the request returns at
//! once and the outcome arrives later through a [`LinkCallback`], which
//! forwards it to the server's connection table.

use std::sync::Arc;

use crate::server::ServerHandle;

use super::discovery::{DiscoveryRole, PeerToken, TransportHandle};

/// Link provisioning failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// The platform refused the request
    #[error("link request rejected: {0}")]
    Rejected(String),
}

/// Platform link provisioning
pub trait LinkProvisioning: Send + Sync + 'static {
    /// Request an isolated link to `peer` reaching `local_port`
    fn request_link(
        &self,
        peer: &PeerToken,
        role: DiscoveryRole,
        local_port: u16,
        passphrase: &str,
        callback: LinkCallback,
    ) -> Result<(), LinkError>;
}

impl<L: LinkProvisioning> LinkProvisioning for Arc<L> {
    fn request_link(
        &self,
        peer: &PeerToken,
        role: DiscoveryRole,
        local_port: u16,
        passphrase: &str,
        callback: LinkCallback,
    ) -> Result<(), LinkError> {
        (**self).request_link(peer, role, local_port, passphrase, callback)
    }
}

/// Routes link outcomes back to the server's connection for one peer
#[derive(Debug, Clone)]
pub struct LinkCallback {
    peer: PeerToken,
    server: ServerHandle,
}

impl LinkCallback {
    pub fn new(peer: PeerToken, server: ServerHandle) -> Self {
        Self { peer, server }
    }

    pub fn peer(&self) -> &PeerToken {
        &self.peer
    }

    /// The link is up
    pub fn on_available(&self, handle: TransportHandle) {
        tracing::info!(peer = %self.peer, network = %handle, "Link available");
        if let Err(e) = self.server.bind_transport(self.peer.clone(), handle) {
            tracing::warn!(peer = %self.peer, error = %e, "Failed to bind transport");
        }
    }

    /// The link could not be set up
    pub fn on_unavailable(&self) {
        tracing::warn!(peer = %self.peer, "Link unavailable");
        self.drop_connection();
    }

    /// An established link went away
    pub fn on_lost(&self) {
        tracing::warn!(peer = %self.peer, "Link lost");
        self.drop_connection();
    }

    fn drop_connection(&self) {
        if let Err(e) = self.server.remove_connection(self.peer.clone()) {
            tracing::debug!(peer = %self.peer, error = %e, "Connection already gone");
        }
    }
}

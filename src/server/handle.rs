//! Server handle
//!
//! Cloneable front end of the server loop. Every operation is a
//! [`ChangeRequest`]; those with a result carry a oneshot reply.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::peer::{DiscoveryRole, PeerToken, TransportHandle};
use crate::registry::StreamRegistry;
use crate::session::ChannelId;
use crate::stats::ServerStats;

use super::change::{ChangeRequest, ConnectionStatus};

/// Handle to a running server loop
#[derive(Clone)]
pub struct ServerHandle {
    commands: mpsc::UnboundedSender<ChangeRequest>,
    registry: Arc<StreamRegistry>,
    enabled: Arc<AtomicBool>,
}

impl ServerHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<ChangeRequest>,
        registry: Arc<StreamRegistry>,
        enabled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            commands,
            registry,
            enabled,
        }
    }

    /// Queue a change request
    pub fn add_change_request(&self, request: ChangeRequest) -> Result<()> {
        self.commands.send(request).map_err(|_| Error::ServerStopped)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> ChangeRequest) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.add_change_request(make(tx))?;
        rx.await.map_err(|_| Error::ServerStopped)
    }

    /// Enable the server
    pub fn start(&self) -> Result<()> {
        self.add_change_request(ChangeRequest::Start)
    }

    /// Close every channel and disable the server
    ///
    /// Resolves once the loop has torn everything down.
    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| ChangeRequest::Stop { reply: Some(reply) }).await
    }

    /// End the server loop
    pub fn shutdown(&self) -> Result<()> {
        self.add_change_request(ChangeRequest::Shutdown)
    }

    /// Open a plain listener, returning the bound address
    pub async fn add_listener(&self, addr: SocketAddr) -> Result<SocketAddr> {
        self.request(|reply| ChangeRequest::AddListener { addr, reply }).await?
    }

    /// Close a listener or control channel
    pub fn unregister(&self, channel: ChannelId) -> Result<()> {
        self.add_change_request(ChangeRequest::Unregister { channel })
    }

    /// Open an accepting channel for a peer
    pub async fn add_connection(&self, peer: PeerToken, role: DiscoveryRole) -> Result<ConnectionStatus> {
        self.request(|reply| ChangeRequest::AddConnection { peer, role, reply })
            .await?
    }

    /// Record the link a peer's connection runs over
    pub fn bind_transport(&self, peer: PeerToken, handle: TransportHandle) -> Result<()> {
        self.add_change_request(ChangeRequest::BindTransport { peer, handle })
    }

    /// Drop a peer's connection
    pub fn remove_connection(&self, peer: PeerToken) -> Result<()> {
        self.add_change_request(ChangeRequest::RemoveConnection { peer })
    }

    pub async fn has_connection(&self, peer: PeerToken) -> Result<bool> {
        self.request(|reply| ChangeRequest::HasConnection { peer, reply })
            .await
    }

    /// Allow or refuse local playback
    pub fn set_allow_live_streaming(&self, allow: bool) -> Result<()> {
        self.add_change_request(ChangeRequest::SetLiveStreaming(allow))
    }

    pub async fn stats(&self) -> Result<ServerStats> {
        self.request(|reply| ChangeRequest::Stats { reply }).await
    }

    /// The shared stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Whether the server is accepting work
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

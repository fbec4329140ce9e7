//! Peer discovery service interface
//!
//! The discovery transport itself (publish / subscribe over a short-range
//! radio) is provided by the platform. The orchestrator only needs the
//! operations below and the events they produce.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Opaque identifier of a discovered peer
///
/// Unique per peer within one discovery session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerToken(String);

impl PeerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of an isolated network link to one peer
///
/// Transports bound to the handle only carry traffic over that link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportHandle {
    /// Platform network identifier
    pub network_id: u64,
    /// Interface name, if known
    pub interface: Option<String>,
}

impl TransportHandle {
    pub fn new(network_id: u64) -> Self {
        Self {
            network_id,
            interface: None,
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }
}

impl fmt::Display for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.interface {
            Some(interface) => write!(f, "net{}@{}", self.network_id, interface),
            None => write!(f, "net{}", self.network_id),
        }
    }
}

/// Side of a discovery session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryRole {
    /// Advertises the service
    Publisher,
    /// Looks for the service
    Subscriber,
}

/// Events delivered by a discovery session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A peer advertising the service was found
    PeerFound { peer: PeerToken },
    /// A peer sent a message
    MessageReceived { peer: PeerToken, payload: Bytes },
    /// A sent message was delivered
    SendSucceeded { message_id: u32 },
    /// A sent message could not be delivered
    SendFailed { message_id: u32 },
    /// The session died
    SessionFailed,
}

/// Discovery failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    /// Attaching to the service failed
    #[error("attach failed: {0}")]
    AttachFailed(String),

    /// Starting a publish or subscribe session failed
    #[error("session failed: {0}")]
    SessionFailed(String),
}

/// Platform peer discovery
#[async_trait]
pub trait PeerDiscovery: Send + Sync + 'static {
    /// Attach to the discovery service
    async fn attach(&self) -> Result<(), DiscoveryError>;

    /// Start advertising `service_name`, delivering events to `events`
    async fn advertise(
        &self,
        service_name: &str,
        events: mpsc::UnboundedSender<DiscoveryEvent>,
    ) -> Result<(), DiscoveryError>;

    /// Start looking for `service_name`, delivering events to `events`
    async fn discover(
        &self,
        service_name: &str,
        events: mpsc::UnboundedSender<DiscoveryEvent>,
    ) -> Result<(), DiscoveryError>;

    /// Send a message to a peer; delivery is reported as an event
    fn send_message(&self, role: DiscoveryRole, peer: &PeerToken, message_id: u32, payload: &[u8]);

    /// Close the session for `role`
    fn close(&self, role: DiscoveryRole);

    /// Detach from the service
    fn detach(&self);
}

#[async_trait]
impl<D: PeerDiscovery> PeerDiscovery for Arc<D> {
    async fn attach(&self) -> Result<(), DiscoveryError> {
        (**self).attach().await
    }

    async fn advertise(
        &self,
        service_name: &str,
        events: mpsc::UnboundedSender<DiscoveryEvent>,
    ) -> Result<(), DiscoveryError> {
        (**self).advertise(service_name, events).await
    }

    async fn discover(
        &self,
        service_name: &str,
        events: mpsc::UnboundedSender<DiscoveryEvent>,
    ) -> Result<(), DiscoveryError> {
        (**self).discover(service_name, events).await
    }

    fn send_message(&self, role: DiscoveryRole, peer: &PeerToken, message_id: u32, payload: &[u8]) {
        (**self).send_message(role, peer, message_id, payload)
    }

    fn close(&self, role: DiscoveryRole) {
        (**self).close(role)
    }

    fn detach(&self) {
        (**self).detach()
    }
}

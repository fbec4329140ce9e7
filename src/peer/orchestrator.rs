//! Peer connection orchestrator
//!
//! Drives a discovery session for each role and turns discovered peers into
//! server connections:
//!
//! ```text
//!   PeerFound / "connect" ──► ConnectThrottle ──► send_message("connect")
//!                                   ▲                     │
//!                                   └── settle delay ◄── SendSucceeded / SendFailed
//!                                                         (matching message id)
//!
//!   "connect" received ──► ConnectThrottle ──► ServerHandle::add_connection
//!                                                     │
//!                                                request_link ──► send_message("connect")
//!                                                     │
//!                     bind_transport / remove_connection (LinkCallback)
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::error::{Error, Result};
use crate::server::{ConnectionStatus, ServerHandle};

use super::config::OrchestratorConfig;
use super::discovery::{DiscoveryError, DiscoveryEvent, DiscoveryRole, PeerDiscovery, PeerToken};
use super::link::{LinkCallback, LinkProvisioning};
use super::throttle::ConnectThrottle;

/// Discovery and link orchestration for one device
pub struct PeerOrchestrator<D, L> {
    inner: Arc<Inner<D, L>>,
}

struct Inner<D, L> {
    config: OrchestratorConfig,
    discovery: D,
    links: L,
    server: ServerHandle,
    publisher: ConnectThrottle,
    subscriber: ConnectThrottle,
    event_tasks: Mutex<HashMap<DiscoveryRole, JoinHandle<()>>>,
    next_message_id: AtomicU32,
}

impl<D, L> Clone for PeerOrchestrator<D, L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: PeerDiscovery, L: LinkProvisioning> PeerOrchestrator<D, L> {
    pub fn new(config: OrchestratorConfig, discovery: D, links: L, server: ServerHandle) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                discovery,
                links,
                server,
                publisher: ConnectThrottle::new(),
                subscriber: ConnectThrottle::new(),
                event_tasks: Mutex::new(HashMap::new()),
                next_message_id: AtomicU32::new(1),
            }),
        }
    }

    /// Attach to the discovery service
    pub async fn attach(&self) -> bool {
        match self.outcome("attach", self.inner.discovery.attach()).await {
            Ok(()) => {
                tracing::info!("Discovery attached");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discovery attach failed");
                false
            }
        }
    }

    /// Advertise `name` and serve on-device players
    ///
    /// Starts the server and its local listener. If either fails the publish
    /// session is closed again.
    pub async fn publish_service(&self, name: &str) -> bool {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Err(e) = self.outcome("advertise", self.inner.discovery.advertise(name, tx)).await {
            tracing::warn!(service = name, error = %e, "Publish failed");
            return false;
        }

        if let Err(e) = self.start_local_server().await {
            tracing::warn!(service = name, error = %e, "Local server failed to start");
            self.inner.discovery.close(DiscoveryRole::Publisher);
            return false;
        }

        self.spawn_events(DiscoveryRole::Publisher, rx);
        tracing::info!(service = name, "Service published");
        true
    }

    /// Look for peers advertising `name`
    pub async fn subscribe_to_service(&self, name: &str) -> bool {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Err(e) = self.outcome("discover", self.inner.discovery.discover(name, tx)).await {
            tracing::warn!(service = name, error = %e, "Subscribe failed");
            return false;
        }

        if let Err(e) = self.inner.server.start() {
            tracing::warn!(service = name, error = %e, "Server unavailable");
            self.inner.discovery.close(DiscoveryRole::Subscriber);
            return false;
        }

        self.spawn_events(DiscoveryRole::Subscriber, rx);
        tracing::info!(service = name, "Subscribed to service");
        true
    }

    /// Close both discovery sessions, detach and stop the server
    pub async fn close_sessions(&self) {
        for role in [DiscoveryRole::Publisher, DiscoveryRole::Subscriber] {
            self.inner.discovery.close(role);
            self.inner.throttle(role).clear();
        }

        let tasks: Vec<JoinHandle<()>> = self.inner.event_tasks.lock().drain().map(|(_, task)| task).collect();
        for task in tasks {
            task.abort();
        }

        self.inner.discovery.detach();

        if let Err(e) = self.inner.server.stop().await {
            tracing::debug!(error = %e, "Server already stopped");
        }
        tracing::info!("Discovery sessions closed");
    }

    /// Open a server connection for `peer` and request its link
    ///
    /// A peer that already has a connection is a successful no-op.
    pub async fn connect_peer(&self, peer: PeerToken, role: DiscoveryRole) -> bool {
        self.inner.connect_peer(peer, role).await
    }

    /// Throttle state for `role`
    pub fn throttle(&self, role: DiscoveryRole) -> &ConnectThrottle {
        self.inner.throttle(role)
    }

    pub fn server(&self) -> &ServerHandle {
        &self.inner.server
    }

    async fn outcome<F>(&self, what: &'static str, operation: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<(), DiscoveryError>>,
    {
        match time::timeout(self.inner.config.attach_timeout, operation).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Timeout(what)),
        }
    }

    async fn start_local_server(&self) -> Result<()> {
        self.inner.server.start()?;
        let addr = self.inner.server.add_listener(self.inner.config.local_addr).await?;
        tracing::info!(addr = %addr, "Local listener ready");
        Ok(())
    }

    fn spawn_events(&self, role: DiscoveryRole, mut events: mpsc::UnboundedReceiver<DiscoveryEvent>) {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !inner.handle_event(role, event).await {
                    break;
                }
            }
            tracing::debug!(role = ?role, "Discovery events ended");
        });

        if let Some(previous) = self.inner.event_tasks.lock().insert(role, task) {
            previous.abort();
        }
    }
}

impl<D: PeerDiscovery, L: LinkProvisioning> Inner<D, L> {
    fn throttle(&self, role: DiscoveryRole) -> &ConnectThrottle {
        match role {
            DiscoveryRole::Publisher => &self.publisher,
            DiscoveryRole::Subscriber => &self.subscriber,
        }
    }

    /// Returns `false` once the session for `role` is gone
    async fn handle_event(self: &Arc<Self>, role: DiscoveryRole, event: DiscoveryEvent) -> bool {
        match event {
            DiscoveryEvent::PeerFound { peer } => {
                tracing::debug!(role = ?role, peer = %peer, "Peer found");
                if role == DiscoveryRole::Subscriber {
                    self.offer(role, peer).await;
                }
            }
            DiscoveryEvent::MessageReceived { peer, payload } => match role {
                DiscoveryRole::Publisher if payload == self.config.connect_payload => {
                    tracing::debug!(peer = %peer, "Connect request");
                    self.offer(role, peer).await;
                }
                DiscoveryRole::Publisher => {
                    tracing::debug!(peer = %peer, len = payload.len(), "Ignoring message");
                }
                DiscoveryRole::Subscriber => {
                    tracing::debug!(peer = %peer, "Connect reply");
                    self.connect_peer(peer, role).await;
                }
            },
            DiscoveryEvent::SendSucceeded { message_id } | DiscoveryEvent::SendFailed { message_id } => {
                if !self.throttle(role).awaits(message_id) {
                    tracing::debug!(role = ?role, message_id, "Ignoring stale send outcome");
                    return true;
                }
                tracing::debug!(role = ?role, message_id, "Handshake settled");
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    time::sleep(inner.config.settle_delay).await;
                    if let Some(next) = inner.throttle(role).complete(message_id) {
                        inner.dispatch(role, next).await;
                    }
                });
            }
            DiscoveryEvent::SessionFailed => {
                tracing::warn!(role = ?role, "Discovery session failed");
                self.discovery.close(role);
                self.throttle(role).clear();
                return false;
            }
        }
        true
    }

    async fn offer(&self, role: DiscoveryRole, peer: PeerToken) {
        if self.throttle(role).offer(peer.clone()) {
            self.dispatch(role, peer).await;
        } else {
            tracing::debug!(role = ?role, peer = %peer, "Handshake queued");
        }
    }

    /// Run the handshake for the peer holding the slot
    ///
    /// A publisher opens the peer's connection before answering. If that
    /// fails the slot passes to the next queued peer.
    async fn dispatch(&self, role: DiscoveryRole, mut peer: PeerToken) {
        loop {
            if role == DiscoveryRole::Subscriber || self.connect_peer(peer.clone(), role).await {
                self.send_connect(role, &peer);
                return;
            }

            match self.throttle(role).abandon(&peer) {
                Some(next) => peer = next,
                None => return,
            }
        }
    }

    fn send_connect(&self, role: DiscoveryRole, peer: &PeerToken) {
        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        if !self.throttle(role).sent(peer, message_id) {
            tracing::debug!(role = ?role, peer = %peer, "Handshake slot released");
            return;
        }
        tracing::debug!(role = ?role, peer = %peer, message_id, "Sending connect");
        self.discovery
            .send_message(role, peer, message_id, &self.config.connect_payload);
    }

    async fn connect_peer(&self, peer: PeerToken, role: DiscoveryRole) -> bool {
        let addr = match self.server.add_connection(peer.clone(), role).await {
            Ok(ConnectionStatus::AlreadyConnected) => return true,
            Ok(ConnectionStatus::Created(addr)) => addr,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "Failed to open peer channel");
                return false;
            }
        };

        let callback = LinkCallback::new(peer.clone(), self.server.clone());
        match self
            .links
            .request_link(&peer, role, addr.port(), &self.config.passphrase, callback)
        {
            Ok(()) => {
                tracing::info!(peer = %peer, port = addr.port(), "Link requested");
                true
            }
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "Link request failed");
                if let Err(e) = self.server.remove_connection(peer.clone()) {
                    tracing::debug!(peer = %peer, error = %e, "Connection already gone");
                }
                false
            }
        }
    }
}

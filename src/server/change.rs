//! Change requests
//!
//! Only the server loop touches listeners, channels and the connection
//! table. Every other task describes what it wants as a [`ChangeRequest`];
//! the loop drains the queue before looking at socket events.

use std::net::SocketAddr;

use tokio::sync::oneshot;

use crate::error::Result;
use crate::peer::{DiscoveryRole, PeerToken, TransportHandle};
use crate::session::ChannelId;
use crate::stats::ServerStats;

/// Outcome of adding a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// A new accepting channel was opened at this address
    Created(SocketAddr),
    /// The peer already had a connection
    AlreadyConnected,
}

/// A mutation queued for the server loop
#[derive(Debug)]
pub enum ChangeRequest {
    /// Enable the server
    Start,

    /// Open a plain listener
    AddListener {
        addr: SocketAddr,
        reply: oneshot::Sender<Result<SocketAddr>>,
    },

    /// Close a listener or control channel
    Unregister { channel: ChannelId },

    /// Open an accepting channel for a peer
    AddConnection {
        peer: PeerToken,
        role: DiscoveryRole,
        reply: oneshot::Sender<Result<ConnectionStatus>>,
    },

    /// Record the link a peer's connection runs over
    BindTransport {
        peer: PeerToken,
        handle: TransportHandle,
    },

    /// Drop a peer's connection and everything accepted from it
    RemoveConnection { peer: PeerToken },

    /// Ask whether a peer has a connection
    HasConnection {
        peer: PeerToken,
        reply: oneshot::Sender<bool>,
    },

    /// Allow or refuse local playback
    SetLiveStreaming(bool),

    /// Snapshot statistics
    Stats { reply: oneshot::Sender<ServerStats> },

    /// Close everything and disable the server
    Stop { reply: Option<oneshot::Sender<()>> },

    /// Stop and end the loop
    Shutdown,
}

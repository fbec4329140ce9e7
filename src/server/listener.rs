//! Relay server loop
//!
//! One task owns every listener, control channel and peer connection. Socket
//! reads and accepts happen in small helper tasks that report back as
//! [`ChannelEvent`]s; all protocol processing happens here, one request at a
//! time. Responses are queued to a per-channel writer task, so a client that
//! stops reading never stalls the loop.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::ProtocolEngine;
use crate::error::{Error, Result};
use crate::media::MediaBackend;
use crate::peer::{DiscoveryRole, PeerToken, TransportHandle};
use crate::protocol::{RequestDecoder, RtspResponse, StatusCode};
use crate::registry::StreamRegistry;
use crate::server::config::ServerConfig;
use crate::session::{ChannelContext, ChannelId};
use crate::stats::{ServerCounters, ServerStats};

use super::change::{ChangeRequest, ConnectionStatus};
use super::handle::ServerHandle;

/// Socket activity reported to the loop
#[derive(Debug)]
enum ChannelEvent {
    Accepted {
        listener: ChannelId,
        stream: TcpStream,
        peer_addr: SocketAddr,
    },
    Data {
        channel: ChannelId,
        data: Bytes,
    },
    Closed {
        channel: ChannelId,
    },
}

/// An accepting socket
struct Listener {
    local_addr: SocketAddr,
    peer: Option<PeerToken>,
    task: JoinHandle<()>,
}

/// An accepted control channel
struct Channel {
    ctx: ChannelContext,
    listener: ChannelId,
    outbound: mpsc::UnboundedSender<Bytes>,
    decoder: RequestDecoder,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// A peer's entry in the connection table
#[derive(Debug)]
struct Connection {
    listener: ChannelId,
    role: DiscoveryRole,
    binding: Option<TransportHandle>,
}

/// Multiplexing relay server
pub struct RelayServer<M: MediaBackend> {
    config: ServerConfig,
    engine: ProtocolEngine<M>,
    commands: mpsc::UnboundedReceiver<ChangeRequest>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    listeners: HashMap<ChannelId, Listener>,
    channels: HashMap<ChannelId, Channel>,
    connections: HashMap<PeerToken, Connection>,
    next_channel_id: u64,
    enabled: Arc<AtomicBool>,
    counters: ServerCounters,
}

impl<M: MediaBackend> RelayServer<M> {
    /// Spawn a server loop with a fresh registry
    pub fn spawn(config: ServerConfig, media: M) -> ServerHandle {
        Self::spawn_with_registry(config, Arc::new(StreamRegistry::new()), media)
    }

    /// Spawn a server loop sharing `registry`
    ///
    /// The loop starts disabled; call [`ServerHandle::start`] before adding
    /// listeners or connections.
    pub fn spawn_with_registry(config: ServerConfig, registry: Arc<StreamRegistry>, media: M) -> ServerHandle {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let enabled = Arc::new(AtomicBool::new(false));

        let server = Self {
            engine: ProtocolEngine::new(&config, Arc::clone(&registry), media),
            config,
            commands,
            events_tx,
            events,
            listeners: HashMap::new(),
            channels: HashMap::new(),
            connections: HashMap::new(),
            next_channel_id: 1,
            enabled: Arc::clone(&enabled),
            counters: ServerCounters::new(),
        };

        tokio::spawn(server.run());

        ServerHandle::new(commands_tx, registry, enabled)
    }

    /// Run the loop until shutdown or until every handle is dropped
    async fn run(mut self) {
        tracing::debug!("Relay server loop started");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(ChangeRequest::Shutdown) | None => break,
                    Some(command) => self.apply(command).await,
                },

                Some(event) = self.events.recv() => self.handle_event(event).await,
            }
        }

        self.stop_all().await;
        tracing::debug!("Relay server loop exited");
    }

    async fn apply(&mut self, command: ChangeRequest) {
        match command {
            ChangeRequest::Start => {
                if !self.enabled.swap(true, Ordering::AcqRel) {
                    self.counters.restart();
                    tracing::info!("Relay server started");
                }
            }
            ChangeRequest::AddListener { addr, reply } => {
                let result = self.open_listener(addr, None).await.map(|(_, addr)| addr);
                let _ = reply.send(result);
            }
            ChangeRequest::Unregister { channel } => {
                if self.listeners.contains_key(&channel) {
                    self.close_listener(channel).await;
                } else {
                    self.close_channel(channel).await;
                }
            }
            ChangeRequest::AddConnection { peer, role, reply } => {
                let result = self.add_connection(peer, role).await;
                let _ = reply.send(result);
            }
            ChangeRequest::BindTransport { peer, handle } => self.bind_transport(&peer, handle),
            ChangeRequest::RemoveConnection { peer } => self.remove_connection(&peer).await,
            ChangeRequest::HasConnection { peer, reply } => {
                let _ = reply.send(self.connections.contains_key(&peer));
            }
            ChangeRequest::SetLiveStreaming(allow) => {
                tracing::info!(allow = allow, "Live streaming toggled");
                self.engine.set_allow_live_streaming(allow).await;
            }
            ChangeRequest::Stats { reply } => {
                let stats = self.stats().await;
                let _ = reply.send(stats);
            }
            ChangeRequest::Stop { reply } => {
                self.stop_all().await;
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            ChangeRequest::Shutdown => {}
        }
    }

    async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Accepted {
                listener,
                stream,
                peer_addr,
            } => self.accept(listener, stream, peer_addr),
            ChannelEvent::Data { channel, data } => self.on_data(channel, data).await,
            ChannelEvent::Closed { channel } => self.close_channel(channel).await,
        }
    }

    async fn open_listener(&mut self, addr: SocketAddr, peer: Option<PeerToken>) -> Result<(ChannelId, SocketAddr)> {
        if !self.enabled.load(Ordering::Acquire) {
            return Err(Error::ServerStopped);
        }

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let id = self.allocate_channel_id();

        let task = tokio::spawn(accept_loop(id, listener, self.events_tx.clone()));
        self.listeners.insert(
            id,
            Listener {
                local_addr,
                peer,
                task,
            },
        );

        tracing::info!(listener = %id, addr = %local_addr, "Listening");
        Ok((id, local_addr))
    }

    fn accept(&mut self, listener: ChannelId, stream: TcpStream, peer_addr: SocketAddr) {
        let Some(origin) = self.listeners.get(&listener) else {
            return;
        };

        // Disabling Nagle keeps small control responses prompt
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Failed to configure socket");
        }

        let local_addr = stream.local_addr().unwrap_or(origin.local_addr);
        let binding = origin
            .peer
            .as_ref()
            .and_then(|peer| self.connections.get(peer))
            .and_then(|conn| conn.binding.clone());

        let id = self.allocate_channel_id();
        let (reader, writer) = stream.into_split();
        let reader = tokio::spawn(read_loop(
            id,
            reader,
            self.config.read_buffer_size,
            self.events_tx.clone(),
        ));
        let (outbound, queue) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(id, writer, queue, self.events_tx.clone()));

        self.channels.insert(
            id,
            Channel {
                ctx: ChannelContext::new(id, peer_addr, local_addr).with_binding(binding),
                listener,
                outbound,
                decoder: RequestDecoder::new(self.config.max_request_size),
                reader,
                writer,
            },
        );
        self.counters.total_connections += 1;

        tracing::info!(channel = %id, listener = %listener, peer = %peer_addr, "Channel accepted");
    }

    async fn on_data(&mut self, id: ChannelId, data: Bytes) {
        let Some(channel) = self.channels.get_mut(&id) else {
            return;
        };
        channel.decoder.extend(&data);

        loop {
            let response = match channel.decoder.decode() {
                Ok(Some(request)) => self.engine.process_request(&request, &channel.ctx).await,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(channel = %id, error = %e, "Bad request");
                    RtspResponse::new(e.status())
                }
            };

            self.counters.record_request(response.status == StatusCode::Ok);

            // The writer only hangs up after reporting the channel closed
            let bytes = response.encode(self.engine.server_name());
            if channel.outbound.send(bytes).is_err() {
                break;
            }
        }
    }

    async fn close_channel(&mut self, id: ChannelId) {
        let Some(channel) = self.channels.remove(&id) else {
            return;
        };

        channel.reader.abort();
        channel.writer.abort();
        self.engine.on_client_disconnected(id).await;

        tracing::info!(channel = %id, peer = %channel.ctx.peer_addr, "Channel closed");
    }

    async fn close_listener(&mut self, id: ChannelId) {
        let Some(listener) = self.listeners.remove(&id) else {
            return;
        };
        listener.task.abort();

        let accepted: Vec<ChannelId> = self
            .channels
            .iter()
            .filter(|(_, c)| c.listener == id)
            .map(|(id, _)| *id)
            .collect();
        for channel in accepted {
            self.close_channel(channel).await;
        }

        tracing::info!(listener = %id, addr = %listener.local_addr, "Listener closed");
    }

    async fn add_connection(&mut self, peer: PeerToken, role: DiscoveryRole) -> Result<ConnectionStatus> {
        if self.connections.contains_key(&peer) {
            tracing::debug!(peer = %peer, "Peer already connected");
            return Ok(ConnectionStatus::AlreadyConnected);
        }

        let addr = SocketAddr::new(self.config.link_bind_ip, 0);
        let (listener, local_addr) = self.open_listener(addr, Some(peer.clone())).await?;
        self.connections.insert(
            peer.clone(),
            Connection {
                listener,
                role,
                binding: None,
            },
        );

        tracing::info!(peer = %peer, role = ?role, addr = %local_addr, "Peer connection pending");
        Ok(ConnectionStatus::Created(local_addr))
    }

    fn bind_transport(&mut self, peer: &PeerToken, handle: TransportHandle) {
        let Some(conn) = self.connections.get_mut(peer) else {
            tracing::warn!(peer = %peer, "Transport for unknown peer");
            return;
        };

        for channel in self.channels.values_mut().filter(|c| c.listener == conn.listener) {
            channel.ctx.binding = Some(handle.clone());
        }

        tracing::info!(peer = %peer, role = ?conn.role, network = %handle, "Transport bound");
        conn.binding = Some(handle);
    }

    async fn remove_connection(&mut self, peer: &PeerToken) {
        let Some(conn) = self.connections.remove(peer) else {
            return;
        };

        self.close_listener(conn.listener).await;
        tracing::info!(peer = %peer, "Peer connection removed");
    }

    async fn stop_all(&mut self) {
        let channels: Vec<ChannelId> = self.channels.keys().copied().collect();
        for channel in channels {
            self.close_channel(channel).await;
        }

        for (_, listener) in self.listeners.drain() {
            listener.task.abort();
        }
        self.connections.clear();
        self.engine.shutdown().await;

        if self.enabled.swap(false, Ordering::AcqRel) {
            tracing::info!("Relay server stopped");
        }
    }

    async fn stats(&self) -> ServerStats {
        ServerStats {
            total_connections: self.counters.total_connections,
            active_channels: self.channels.len() as u64,
            active_listeners: self.listeners.len() as u64,
            requests_handled: self.counters.requests_handled,
            requests_failed: self.counters.requests_failed,
            active_peer_connections: self.connections.len() as u64,
            active_sessions: self.engine.session_count() as u64,
            published_streams: self.engine.registry().len().await as u64,
            uptime: self.counters.uptime(),
        }
    }

    fn allocate_channel_id(&mut self) -> ChannelId {
        let id = ChannelId(self.next_channel_id);
        self.next_channel_id += 1;
        id
    }
}

async fn accept_loop(id: ChannelId, listener: TcpListener, events: mpsc::UnboundedSender<ChannelEvent>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let event = ChannelEvent::Accepted {
                    listener: id,
                    stream,
                    peer_addr,
                };
                if events.send(event).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!(listener = %id, error = %e, "Failed to accept connection");
            }
        }
    }
}

async fn read_loop(
    id: ChannelId,
    mut reader: OwnedReadHalf,
    buffer_size: usize,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let mut buf = vec![0u8; buffer_size.max(1)];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let data = Bytes::copy_from_slice(&buf[..n]);
                if events.send(ChannelEvent::Data { channel: id, data }).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!(channel = %id, error = %e, "Read failed");
                break;
            }
        }
    }

    let _ = events.send(ChannelEvent::Closed { channel: id });
}

async fn write_loop(
    id: ChannelId,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    while let Some(bytes) = queue.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            tracing::debug!(channel = %id, error = %e, "Write failed");
            let _ = events.send(ChannelEvent::Closed { channel: id });
            return;
        }
    }

    let _ = writer.shutdown().await;
}

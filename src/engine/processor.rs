//! Request processing
//!
//! The engine runs inside the server loop. Requests from every channel are
//! processed one at a time, so the per-channel session tables need no lock;
//! only the shared [`StreamRegistry`] is guarded.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::error::{ProtocolError, Result};
use crate::media::{MediaBackend, TrackStart};
use crate::peer::TransportHandle;
use crate::protocol::constants::{LIVE_PATH, PUBLIC_METHODS, SDP_CONTENT_TYPE};
use crate::protocol::transport::parse_client_port;
use crate::protocol::uri::parse_track_id;
use crate::protocol::{
    AnnouncedDescription, Method, PortPair, RtspRequest, RtspResponse, TransportMode,
    TransportReply,
};
use crate::registry::{RegistryError, StreamId, StreamRegistry};
use crate::server::config::{Credentials, ServerConfig};
use crate::session::{
    ChannelContext, ChannelId, ChannelSessions, IngestSession, PlaybackSession, PortAllocator,
    RelaySession, RemovedSession, SessionEvent, SessionRole, SessionSlot, Track,
};

use super::auth;

/// Everything needed to start a track once SETUP was accepted
struct SetupPlan {
    session_id: u64,
    role: SessionRole,
    track: Track,
    destination: IpAddr,
    remote: IpAddr,
    source_ports: Option<PortPair>,
    binding: Option<TransportHandle>,
}

/// Control-protocol engine
pub struct ProtocolEngine<M: MediaBackend> {
    server_name: String,
    credentials: Option<Credentials>,
    allow_live_streaming: bool,
    session_timeout_secs: u64,
    registry: Arc<StreamRegistry>,
    media: M,
    ports: PortAllocator,
    channels: HashMap<ChannelId, ChannelSessions>,
    next_session_id: u64,
}

impl<M: MediaBackend> ProtocolEngine<M> {
    /// Create an engine
    pub fn new(config: &ServerConfig, registry: Arc<StreamRegistry>, media: M) -> Self {
        Self {
            server_name: config.server_name.clone(),
            credentials: config.credentials.clone(),
            allow_live_streaming: config.allow_live_streaming,
            session_timeout_secs: config.session_timeout.as_secs(),
            registry,
            media,
            ports: PortAllocator::new(config.rtp_port_range.clone()),
            channels: HashMap::new(),
            next_session_id: 1,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Sessions held by a channel
    pub fn sessions(&self, channel: ChannelId) -> Option<&ChannelSessions> {
        self.channels.get(&channel)
    }

    /// Number of live sessions across all channels
    pub fn session_count(&self) -> usize {
        self.channels.values().map(ChannelSessions::len).sum()
    }

    pub fn allows_live_streaming(&self) -> bool {
        self.allow_live_streaming
    }

    /// Process one request and build its response
    pub async fn process_request(&mut self, request: &RtspRequest, ctx: &ChannelContext) -> RtspResponse {
        let method = match request.method() {
            Ok(method) => method,
            Err(e) => {
                tracing::warn!(channel = %ctx.id, method = %request.method, "Unknown method");
                return RtspResponse::error(request, e.status());
            }
        };

        tracing::debug!(
            channel = %ctx.id,
            method = %method,
            uri = %request.uri,
            "Processing request"
        );

        if method != Method::Options
            && !auth::is_authorized(self.credentials.as_ref(), request.header("authorization"))
        {
            let e = ProtocolError::Unauthorized;
            tracing::warn!(channel = %ctx.id, peer = %ctx.peer_addr, method = %method, error = %e, "Request rejected");
            return RtspResponse::error(request, e.status())
                .header("WWW-Authenticate", auth::challenge(&self.server_name));
        }

        let result = match method {
            Method::Options => Ok(RtspResponse::ok(request).header("Public", PUBLIC_METHODS)),
            Method::Describe => self.describe(request, ctx).await,
            Method::Announce => self.announce(request, ctx).await,
            Method::Setup => self.setup(request, ctx),
            Method::Play => self.play(request, ctx),
            Method::Record => self.record(request, ctx).await,
            Method::Pause => Ok(RtspResponse::ok(request)),
            Method::Teardown => self.teardown(request, ctx).await,
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(channel = %ctx.id, method = %method, error = %e, "Request rejected");
            RtspResponse::error(request, e.status())
        })
    }

    /// Release every session of a channel that went away
    pub async fn on_client_disconnected(&mut self, channel: ChannelId) {
        let Some(mut sessions) = self.channels.remove(&channel) else {
            return;
        };

        let removed = sessions.drain();
        if !removed.is_empty() {
            tracing::info!(channel = %channel, sessions = removed.len(), "Releasing sessions of closed channel");
        }
        for session in removed {
            self.release(session).await;
        }
    }

    /// Allow or refuse local playback
    ///
    /// Refusing tears down every live playback session.
    pub async fn set_allow_live_streaming(&mut self, allow: bool) {
        self.allow_live_streaming = allow;
        if allow {
            return;
        }

        let playbacks: Vec<_> = self
            .channels
            .values_mut()
            .filter_map(|sessions| sessions.playback.take())
            .collect();

        for session in playbacks {
            self.release(RemovedSession::Playback(session)).await;
        }
    }

    /// Release every session on every channel
    pub async fn shutdown(&mut self) {
        let channels: Vec<ChannelId> = self.channels.keys().copied().collect();
        for channel in channels {
            self.on_client_disconnected(channel).await;
        }
    }

    async fn describe(&mut self, request: &RtspRequest, ctx: &ChannelContext) -> Result<RtspResponse> {
        let path = request.path.as_str();
        let local_path = path.is_empty() || path.eq_ignore_ascii_case(LIVE_PATH);

        let sdp = if local_path && self.allow_live_streaming {
            let capture = self.media.configure_capture()?;
            let mut session = PlaybackSession::new(self.allocate_session_id(), capture, ctx, &self.ports);
            let sdp = session.describe()?;

            tracing::info!(channel = %ctx.id, session_id = session.state.id, "Playback session created");
            let replaced = self.channels.entry(ctx.id).or_default().playback.replace(session);
            if let Some(old) = replaced {
                self.release(RemovedSession::Playback(old)).await;
            }
            sdp
        } else {
            let stream_id: StreamId = path.parse()?;
            let streaming = self
                .registry
                .get(&stream_id)
                .await
                .ok_or(RegistryError::StreamNotFound(stream_id))?;

            let source = Arc::clone(&streaming.source);
            let mut session = RelaySession::new(self.allocate_session_id(), source, ctx, &self.ports);
            let sdp = session.describe()?;

            tracing::info!(
                channel = %ctx.id,
                session_id = session.state.id,
                stream = %stream_id,
                "Relay session created"
            );
            let replaced = self.channels.entry(ctx.id).or_default().relay.replace(session);
            if let Some(old) = replaced {
                self.release(RemovedSession::Relay(old)).await;
            }
            sdp
        };

        Ok(RtspResponse::ok(request)
            .header("Content-Base", content_base(ctx))
            .header("Content-Type", SDP_CONTENT_TYPE)
            .body(sdp))
    }

    async fn announce(&mut self, request: &RtspRequest, ctx: &ChannelContext) -> Result<RtspResponse> {
        if request.path.is_empty() {
            return Err(ProtocolError::InvalidStreamId(String::new()).into());
        }
        let stream_id: StreamId = request.path.parse()?;

        let pending = self
            .channels
            .get(&ctx.id)
            .is_some_and(|s| s.ingest.contains_key(&stream_id));
        if pending || self.registry.contains(&stream_id).await {
            return Err(ProtocolError::AlreadyPublished(stream_id.to_string()).into());
        }

        let announced = AnnouncedDescription::parse(&request.body);
        let mut session = IngestSession::new(self.allocate_session_id(), stream_id, announced, ctx, &self.ports);
        session.announce()?;

        let session_id = session.state.id;
        tracing::info!(
            channel = %ctx.id,
            session_id = session_id,
            stream = %stream_id,
            tracks = session.state.tracks.len(),
            "Ingest session announced"
        );
        self.channels.entry(ctx.id).or_default().ingest.insert(stream_id, session);

        Ok(RtspResponse::ok(request)
            .header("Content-Base", content_base(ctx))
            .header("Content-Type", SDP_CONTENT_TYPE)
            .header("Session", self.session_header(session_id)))
    }

    fn setup(&mut self, request: &RtspRequest, ctx: &ChannelContext) -> Result<RtspResponse> {
        let sessions = self.channels.get_mut(&ctx.id).ok_or(ProtocolError::NoSession)?;
        let slot = sessions.resolve(&request.path).ok_or(ProtocolError::NoSession)?;

        let index = parse_track_id(&request.uri)?;
        let remote_ports = match request.header("transport") {
            Some(transport) => parse_client_port(transport)?,
            None => None,
        };

        let plan = match slot {
            SessionSlot::Playback => {
                let session = sessions.playback.as_mut().ok_or(ProtocolError::NoSession)?;
                let track = session.state.setup_track(index, remote_ports)?.clone();
                SetupPlan {
                    session_id: session.state.id,
                    role: SessionRole::Playback,
                    track,
                    destination: session.destination,
                    remote: session.destination,
                    source_ports: None,
                    binding: ctx.binding.clone(),
                }
            }
            SessionSlot::Ingest(id) => {
                let session = sessions.ingest.get_mut(&id).ok_or(ProtocolError::NoSession)?;
                let track = session.state.setup_track(index, remote_ports)?.clone();
                SetupPlan {
                    session_id: session.state.id,
                    role: SessionRole::Ingest,
                    track,
                    destination: session.destination,
                    remote: session.source.origin,
                    source_ports: None,
                    binding: session.binding.clone(),
                }
            }
            SessionSlot::Relay => {
                let session = sessions.relay.as_mut().ok_or(ProtocolError::NoSession)?;
                let track = session.state.setup_track(index, remote_ports)?.clone();
                SetupPlan {
                    session_id: session.state.id,
                    role: SessionRole::Relay,
                    track,
                    destination: session.destination,
                    remote: session.destination,
                    source_ports: session.source_ports(index),
                    binding: ctx.binding.clone(),
                }
            }
        };

        let start = TrackStart {
            session_id: plan.session_id,
            role: plan.role,
            track: &plan.track,
            remote: plan.remote,
            source_ports: plan.source_ports,
            binding: plan.binding.as_ref(),
        };
        if let Err(e) = self.media.start_track(&start) {
            if let Some(state) = sessions.state_mut(slot) {
                state.release_track(index);
            }
            return Err(e.into());
        }

        tracing::debug!(
            channel = %ctx.id,
            session_id = plan.session_id,
            track = index,
            remote_ports = %plan.track.remote_ports,
            "Track configured"
        );

        let reply = TransportReply {
            destination: plan.destination,
            client_ports: plan.track.remote_ports,
            server_ports: plan.track.local_ports,
            ssrc: plan.track.ssrc,
            mode: if plan.role.is_sender() {
                TransportMode::Play
            } else {
                TransportMode::Receive
            },
        };

        Ok(RtspResponse::ok(request)
            .header("Transport", reply.to_string())
            .header("Session", plan.session_id.to_string())
            .header("Cache-Control", "no-cache"))
    }

    fn play(&mut self, request: &RtspRequest, ctx: &ChannelContext) -> Result<RtspResponse> {
        let sessions = self.channels.get_mut(&ctx.id).ok_or(ProtocolError::NoSession)?;
        let slot = sessions.resolve(&request.path).ok_or(ProtocolError::NoSession)?;
        let state = sessions.state_mut(slot).ok_or(ProtocolError::NoSession)?;

        state.advance(SessionEvent::Play)?;

        let rtp_info = [0u8, 1]
            .iter()
            .filter(|index| state.track(**index).is_some())
            .map(|index| format!("url=rtsp://{}/trackID={};seq=0", ctx.local_addr, index))
            .collect::<Vec<_>>()
            .join(",");

        let mut response = RtspResponse::ok(request);
        if !rtp_info.is_empty() {
            response = response.header("RTP-Info", rtp_info);
        }
        Ok(response.header("Session", state.id.to_string()))
    }

    async fn record(&mut self, request: &RtspRequest, ctx: &ChannelContext) -> Result<RtspResponse> {
        let sessions = self.channels.get_mut(&ctx.id).ok_or(ProtocolError::NoSession)?;
        let slot = sessions.resolve(&request.path).ok_or(ProtocolError::NoSession)?;

        let SessionSlot::Ingest(stream_id) = slot else {
            let state = sessions.state(slot).ok_or(ProtocolError::NoSession)?;
            state.next_phase(SessionEvent::Record)?;
            return Err(ProtocolError::NoSession.into());
        };

        let session = sessions.ingest.get_mut(&stream_id).ok_or(ProtocolError::NoSession)?;
        session.check_record()?;
        if session.is_recorded() {
            return Err(ProtocolError::AlreadyPublished(stream_id.to_string()).into());
        }

        self.registry.add(session.streaming()).await?;
        session.record()?;

        let session_id = session.state.id;
        tracing::info!(channel = %ctx.id, session_id = session_id, stream = %stream_id, "Ingest session recording");

        Ok(RtspResponse::ok(request).header("Session", self.session_header(session_id)))
    }

    async fn teardown(&mut self, request: &RtspRequest, ctx: &ChannelContext) -> Result<RtspResponse> {
        let sessions = self.channels.get_mut(&ctx.id).ok_or(ProtocolError::NoSession)?;
        let slot = sessions.resolve(&request.path).ok_or(ProtocolError::NoSession)?;
        let removed = sessions.remove(slot).ok_or(ProtocolError::NoSession)?;

        self.release(removed).await;
        Ok(RtspResponse::ok(request))
    }

    /// Stop a session's tracks and drop its registry entry
    async fn release(&self, mut session: RemovedSession) {
        let state = session.state_mut();
        let session_id = state.id;
        let role = state.role;

        for index in state.tear_down() {
            self.media.stop_track(session_id, index);
        }

        if let RemovedSession::Ingest(ingest) = &session {
            if ingest.is_recorded() {
                self.registry.remove_owned(&ingest.stream_id(), session_id).await;
            }
        }

        tracing::info!(session_id = session_id, role = ?role, "Session torn down");
    }

    fn allocate_session_id(&mut self) -> u64 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        id
    }

    fn session_header(&self, session_id: u64) -> String {
        format!("{};timeout={}", session_id, self.session_timeout_secs)
    }
}

fn content_base(ctx: &ChannelContext) -> String {
    format!("{}:{}/", ctx.local_addr.ip(), ctx.local_addr.port())
}

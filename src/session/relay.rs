//! Relay sessions: a published stream re-sent to another peer

use std::net::IpAddr;
use std::sync::Arc;

use crate::protocol::{PortPair, SessionDescription};
use crate::registry::{StreamId, StreamSource};

use super::context::ChannelContext;
use super::error::SessionError;
use super::ports::PortAllocator;
use super::state::{SessionEvent, SessionRole, SessionState};
use super::track::Track;

/// Session forwarding an ingest source to the requesting peer
///
/// Relay tracks advertise the source's receive ports as their server ports,
/// since that is where the forwarded media comes from.
#[derive(Debug)]
pub struct RelaySession {
    /// Lifecycle and tracks
    pub state: SessionState,

    /// Stream being relayed
    pub source: Arc<StreamSource>,

    /// Address the description originates from
    pub origin: IpAddr,

    /// Address media is sent to
    pub destination: IpAddr,
}

impl RelaySession {
    /// Create a relay of `source`
    pub fn new(id: u64, source: Arc<StreamSource>, ctx: &ChannelContext, ports: &PortAllocator) -> Self {
        let tracks = source
            .tracks
            .iter()
            .map(|t| Track::new(t.kind, t.description.clone(), t.local_ports).with_ssrc(ports.ssrc()));

        Self {
            state: SessionState::new(id, SessionRole::Relay, tracks),
            origin: ctx.local_addr.ip(),
            destination: ctx.peer_addr.ip(),
            source,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.source.stream_id
    }

    /// Ports the relayed track arrives on
    pub fn source_ports(&self, index: u8) -> Option<PortPair> {
        self.source.track(index).map(|t| t.local_ports)
    }

    /// Answer DESCRIBE
    pub fn describe(&mut self) -> Result<String, SessionError> {
        self.state.advance(SessionEvent::Describe)?;

        let sdp = self
            .state
            .tracks
            .values()
            .fold(
                SessionDescription::new(self.state.id, self.origin, self.destination).name(self.source.name.clone()),
                |sdp, track| sdp.track(track.index, track.description.clone()),
            )
            .build();

        Ok(sdp)
    }
}

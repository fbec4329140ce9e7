//! Playback sessions: local capture sent to a peer

use std::net::IpAddr;

use crate::media::CaptureTrack;
use crate::protocol::SessionDescription;

use super::context::ChannelContext;
use super::error::SessionError;
use super::ports::PortAllocator;
use super::state::{SessionEvent, SessionRole, SessionState};
use super::track::Track;

const PLAYBACK_NAME: &str = "Live";

/// Session streaming this device's capture to the requesting peer
#[derive(Debug)]
pub struct PlaybackSession {
    /// Lifecycle and tracks
    pub state: SessionState,

    /// Address the description originates from
    pub origin: IpAddr,

    /// Address media is sent to
    pub destination: IpAddr,
}

impl PlaybackSession {
    /// Create a session for the given capture tracks
    pub fn new(id: u64, capture: Vec<CaptureTrack>, ctx: &ChannelContext, ports: &PortAllocator) -> Self {
        let tracks = capture
            .into_iter()
            .map(|c| Track::new(c.kind, c.description, ports.allocate()).with_ssrc(ports.ssrc()));

        Self {
            state: SessionState::new(id, SessionRole::Playback, tracks),
            origin: ctx.local_addr.ip(),
            destination: ctx.peer_addr.ip(),
        }
    }

    /// Answer DESCRIBE
    pub fn describe(&mut self) -> Result<String, SessionError> {
        self.state.advance(SessionEvent::Describe)?;

        let sdp = self
            .state
            .tracks
            .values()
            .fold(
                SessionDescription::new(self.state.id, self.origin, self.destination).name(PLAYBACK_NAME),
                |sdp, track| sdp.track(track.index, track.description.clone()),
            )
            .build();

        Ok(sdp)
    }
}

//! Ingest sessions: media received from a remote publisher
//!
//! An ingest session is created by ANNOUNCE and stays private to its channel
//! until RECORD publishes it. What relays and the registry need is frozen
//! into an [`StreamSource`] at creation and shared from there.

use std::net::IpAddr;
use std::sync::Arc;

use crate::peer::TransportHandle;
use crate::protocol::AnnouncedDescription;
use crate::registry::{SourceTrack, StreamId, StreamSource, Streaming};

use super::context::ChannelContext;
use super::error::SessionError;
use super::ports::PortAllocator;
use super::state::{SessionEvent, SessionRole, SessionState};
use super::track::Track;

/// Session receiving a publisher's stream
#[derive(Debug)]
pub struct IngestSession {
    /// Lifecycle and tracks
    pub state: SessionState,

    /// Immutable view shared with the registry and relays
    pub source: Arc<StreamSource>,

    /// Local address media is received on
    pub destination: IpAddr,

    /// Isolated link receivers must bind to
    pub binding: Option<TransportHandle>,

    /// Whether RECORD registered this session
    recorded: bool,
}

impl IngestSession {
    /// Create a session from an announced description
    pub fn new(
        id: u64,
        stream_id: StreamId,
        announced: AnnouncedDescription,
        ctx: &ChannelContext,
        ports: &PortAllocator,
    ) -> Self {
        let tracks: Vec<Track> = announced
            .media
            .into_iter()
            .map(|m| Track::new(m.kind, m.text, ports.allocate()))
            .collect();

        let source = StreamSource {
            stream_id,
            session_id: id,
            name: announced.name.unwrap_or_else(|| stream_id.to_string()),
            origin: ctx.peer_addr.ip(),
            tracks: tracks
                .iter()
                .map(|t| SourceTrack {
                    index: t.index,
                    kind: t.kind,
                    description: t.description.clone(),
                    local_ports: t.local_ports,
                })
                .collect(),
            shared_secret: announced.shared_secret,
            shared_secret_mode: announced.shared_secret_mode,
        };

        Self {
            state: SessionState::new(id, SessionRole::Ingest, tracks),
            source: Arc::new(source),
            destination: ctx.local_addr.ip(),
            binding: ctx.binding.clone(),
            recorded: false,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.source.stream_id
    }

    /// Answer ANNOUNCE
    pub fn announce(&mut self) -> Result<(), SessionError> {
        self.state.advance(SessionEvent::Announce).map(|_| ())
    }

    /// Check RECORD is allowed without applying it
    pub fn check_record(&self) -> Result<(), SessionError> {
        self.state.next_phase(SessionEvent::Record).map(|_| ())
    }

    /// Apply RECORD after the registry accepted the entry
    pub fn record(&mut self) -> Result<(), SessionError> {
        self.state.advance(SessionEvent::Record)?;
        self.recorded = true;
        Ok(())
    }

    /// Whether this session owns a registry entry
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    /// Registry entry for this session
    pub fn streaming(&self) -> Streaming {
        Streaming::new(Arc::clone(&self.source))
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use crate::protocol::TrackKind;
    use crate::session::context::ChannelId;

    fn ctx() -> ChannelContext {
        let peer: SocketAddr = "192.168.49.2:40000".parse().unwrap();
        let local: SocketAddr = "192.168.49.1:1234".parse().unwrap();
        ChannelContext::new(ChannelId(1), peer, local)
    }

    #[test]
    fn test_source_mirrors_tracks() {
        let announced = AnnouncedDescription::parse(
            "v=0\r\ns=Camera\r\nm=audio 0 RTP/AVP 97\r\na=rtpmap:97 AAC/44100\r\na=fmtp:97 x\r\nm=video 0 RTP/AVP 96\r\na=rtpmap:96 H264/90000\r\na=fmtp:96 y\r\n",
        );
        let stream_id = StreamId::new_v4();
        let session = IngestSession::new(9, stream_id, announced, &ctx(), &PortAllocator::new(50000..=50100));

        assert_eq!(session.source.name, "Camera");
        assert_eq!(session.source.session_id, 9);
        assert_eq!(session.source.tracks.len(), 2);
        assert_eq!(session.source.track(1).unwrap().kind, TrackKind::Video);
        assert_eq!(
            session.source.track(0).unwrap().local_ports,
            session.state.track(0).unwrap().local_ports
        );
        assert_eq!(session.destination.to_string(), "192.168.49.1");
    }

    #[test]
    fn test_name_falls_back_to_stream_id() {
        let stream_id = StreamId::new_v4();
        let session = IngestSession::new(
            1,
            stream_id,
            AnnouncedDescription::default(),
            &ctx(),
            &PortAllocator::new(50000..=50100),
        );

        assert_eq!(session.source.name, stream_id.to_string());
    }

    #[test]
    fn test_record_marks_recorded() {
        let mut session = IngestSession::new(
            1,
            StreamId::new_v4(),
            AnnouncedDescription::default(),
            &ctx(),
            &PortAllocator::new(50000..=50100),
        );

        assert!(session.check_record().is_err());
        session.announce().unwrap();
        session.check_record().unwrap();
        assert!(!session.is_recorded());
        session.record().unwrap();
        assert!(session.is_recorded());
    }
}

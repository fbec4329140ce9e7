//! Media backend trait

use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use crate::peer::TransportHandle;
use crate::protocol::{PortPair, TrackKind};
use crate::session::{SessionRole, Track};

/// A track offered by local capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTrack {
    /// Media type
    pub kind: TrackKind,
    /// Media section advertised in DESCRIBE
    pub description: String,
}

/// Everything needed to start one track's transport
#[derive(Debug)]
pub struct TrackStart<'a> {
    /// Owning session
    pub session_id: u64,
    /// Role of the owning session
    pub role: SessionRole,
    /// The negotiated track
    pub track: &'a Track,
    /// Address media is sent to (senders) or expected from (ingest)
    pub remote: IpAddr,
    /// For relays, the ports the source stream arrives on
    pub source_ports: Option<PortPair>,
    /// Isolated link the transport must be bound to
    pub binding: Option<&'a TransportHandle>,
}

/// Local media capture and RTP transport
///
/// Calls are made from the server loop, so implementations should hand long
/// work off to their own tasks.
pub trait MediaBackend: Send + Sync + 'static {
    /// Describe the tracks local capture can offer
    fn configure_capture(&self) -> io::Result<Vec<CaptureTrack>>;

    /// Start sending or receiving one track
    fn start_track(&self, start: &TrackStart<'_>) -> io::Result<()>;

    /// Stop a track started with [`MediaBackend::start_track`]
    fn stop_track(&self, session_id: u64, index: u8);
}

impl<M: MediaBackend> MediaBackend for Arc<M> {
    fn configure_capture(&self) -> io::Result<Vec<CaptureTrack>> {
        (**self).configure_capture()
    }

    fn start_track(&self, start: &TrackStart<'_>) -> io::Result<()> {
        (**self).start_track(start)
    }

    fn stop_track(&self, session_id: u64, index: u8) {
        (**self).stop_track(session_id, index)
    }
}

//! Per-track transport state

use crate::protocol::{PortPair, TrackKind};

/// A media track owned by one session
///
/// Local ports are fixed at creation. Remote ports start out equal to the
/// local ones and are replaced by each SETUP that carries `client_port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Track index (0 = audio, 1 = video)
    pub index: u8,

    /// Media type
    pub kind: TrackKind,

    /// Media section text
    pub description: String,

    /// Local RTP/RTCP ports
    pub local_ports: PortPair,

    /// Remote RTP/RTCP ports
    pub remote_ports: PortPair,

    /// Synchronization source for outgoing media
    pub ssrc: Option<u32>,

    /// Whether SETUP has been received for this track
    configured: bool,
}

impl Track {
    /// Create an unconfigured track
    pub fn new(kind: TrackKind, description: impl Into<String>, local_ports: PortPair) -> Self {
        Self {
            index: kind.index(),
            kind,
            description: description.into(),
            local_ports,
            remote_ports: local_ports,
            ssrc: None,
            configured: false,
        }
    }

    /// Set the outgoing synchronization source
    pub fn with_ssrc(mut self, ssrc: u32) -> Self {
        self.ssrc = Some(ssrc);
        self
    }

    /// Apply a SETUP
    ///
    /// Repeating SETUP only replaces the remote ports.
    pub fn setup(&mut self, remote: Option<PortPair>) {
        if let Some(ports) = remote {
            self.remote_ports = ports;
        }
        self.configured = true;
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Mark the track's transport as released
    pub fn release(&mut self) {
        self.configured = false;
    }
}

//! Registry entry types
//!
//! This module defines the per-stream state stored in the registry.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::protocol::{PortPair, TrackKind};

use super::key::StreamId;

/// A track offered by a publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTrack {
    /// Track index (0 = audio, 1 = video)
    pub index: u8,
    /// Media type
    pub kind: TrackKind,
    /// Media section as announced by the publisher
    pub description: String,
    /// Local ports media from the publisher arrives on
    pub local_ports: PortPair,
}

/// Immutable view of an ingest session
///
/// Shared between the ingest session, its registry entry and every relay
/// session reading from it.
#[derive(Debug, Clone)]
pub struct StreamSource {
    /// Stream identifier
    pub stream_id: StreamId,
    /// Id of the ingest session that owns the stream
    pub session_id: u64,
    /// Display name
    pub name: String,
    /// Publisher address
    pub origin: IpAddr,
    /// Announced tracks
    pub tracks: Vec<SourceTrack>,
    /// Publisher uses a shared secret
    pub shared_secret: bool,
    /// Shared secret mode
    pub shared_secret_mode: bool,
}

impl StreamSource {
    /// Get a track by index
    pub fn track(&self, index: u8) -> Option<&SourceTrack> {
        self.tracks.iter().find(|t| t.index == index)
    }
}

/// A published stream
#[derive(Debug)]
pub struct Streaming {
    /// Stream identifier
    pub id: StreamId,

    /// Display name
    pub name: String,

    /// The owning ingest session's source view
    pub source: std::sync::Arc<StreamSource>,

    /// Publisher uses a shared secret
    pub shared_secret: bool,

    /// Shared secret mode
    pub shared_secret_mode: bool,

    /// Whether a local consumer is currently downloading the stream
    downloading: AtomicBool,

    /// When the stream was published
    pub published_at: Instant,
}

impl Streaming {
    /// Create an entry for a recorded ingest session
    pub fn new(source: std::sync::Arc<StreamSource>) -> Self {
        Self {
            id: source.stream_id,
            name: source.name.clone(),
            shared_secret: source.shared_secret,
            shared_secret_mode: source.shared_secret_mode,
            source,
            downloading: AtomicBool::new(false),
            published_at: Instant::now(),
        }
    }

    /// Id of the ingest session that owns this entry
    pub fn owner_session(&self) -> u64 {
        self.source.session_id
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading.load(Ordering::Relaxed)
    }

    pub fn set_downloading(&self, downloading: bool) {
        self.downloading.store(downloading, Ordering::Relaxed);
    }
}

/// Registry change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A stream was published
    Added { id: StreamId, name: String },
    /// A stream went away
    Removed { id: StreamId },
}

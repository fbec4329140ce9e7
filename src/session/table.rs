//! Per-channel session table

use std::collections::HashMap;

use crate::registry::StreamId;

use super::ingest::IngestSession;
use super::playback::PlaybackSession;
use super::relay::RelaySession;
use super::state::SessionState;

/// Which of a channel's sessions a request addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSlot {
    Playback,
    Ingest(StreamId),
    Relay,
}

/// A session taken out of its table
#[derive(Debug)]
pub enum RemovedSession {
    Playback(PlaybackSession),
    Ingest(IngestSession),
    Relay(RelaySession),
}

impl RemovedSession {
    pub fn state_mut(&mut self) -> &mut SessionState {
        match self {
            RemovedSession::Playback(s) => &mut s.state,
            RemovedSession::Ingest(s) => &mut s.state,
            RemovedSession::Relay(s) => &mut s.state,
        }
    }
}

/// All sessions living on one channel
///
/// A channel may hold one playback session, any number of ingest sessions
/// (one per announced stream) and one relay session at the same time.
#[derive(Debug, Default)]
pub struct ChannelSessions {
    /// Local playback
    pub playback: Option<PlaybackSession>,

    /// Announced streams, keyed by stream id
    pub ingest: HashMap<StreamId, IngestSession>,

    /// Relay of a published stream
    pub relay: Option<RelaySession>,
}

impl ChannelSessions {
    /// Resolve the session a request addresses
    ///
    /// Playback wins, then an ingest session named by the path, then the
    /// relay session.
    pub fn resolve(&self, path: &str) -> Option<SessionSlot> {
        if self.playback.is_some() {
            return Some(SessionSlot::Playback);
        }

        if let Ok(id) = path.parse::<StreamId>() {
            if self.ingest.contains_key(&id) {
                return Some(SessionSlot::Ingest(id));
            }
        }

        self.relay.as_ref().map(|_| SessionSlot::Relay)
    }

    pub fn state(&self, slot: SessionSlot) -> Option<&SessionState> {
        match slot {
            SessionSlot::Playback => self.playback.as_ref().map(|s| &s.state),
            SessionSlot::Ingest(id) => self.ingest.get(&id).map(|s| &s.state),
            SessionSlot::Relay => self.relay.as_ref().map(|s| &s.state),
        }
    }

    pub fn state_mut(&mut self, slot: SessionSlot) -> Option<&mut SessionState> {
        match slot {
            SessionSlot::Playback => self.playback.as_mut().map(|s| &mut s.state),
            SessionSlot::Ingest(id) => self.ingest.get_mut(&id).map(|s| &mut s.state),
            SessionSlot::Relay => self.relay.as_mut().map(|s| &mut s.state),
        }
    }

    /// Take a session out of the table
    pub fn remove(&mut self, slot: SessionSlot) -> Option<RemovedSession> {
        match slot {
            SessionSlot::Playback => self.playback.take().map(RemovedSession::Playback),
            SessionSlot::Ingest(id) => self.ingest.remove(&id).map(RemovedSession::Ingest),
            SessionSlot::Relay => self.relay.take().map(RemovedSession::Relay),
        }
    }

    /// Take every session out of the table
    pub fn drain(&mut self) -> Vec<RemovedSession> {
        let mut removed = Vec::with_capacity(self.len());
        removed.extend(self.playback.take().map(RemovedSession::Playback));
        removed.extend(self.ingest.drain().map(|(_, s)| RemovedSession::Ingest(s)));
        removed.extend(self.relay.take().map(RemovedSession::Relay));
        removed
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        usize::from(self.playback.is_some()) + self.ingest.len() + usize::from(self.relay.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Session state machine
//!
//! Tracks a session from creation to teardown:
//!
//! ```text
//! Created ──DESCRIBE──► Described ──PLAY───► Active
//!    │                                         ▲
//!    └─────ANNOUNCE───► Announced ──RECORD─────┘
//!
//! any ──TEARDOWN──► TornDown (terminal)
//! ```
//!
//! SETUP is accepted in Described, Announced and Active and never changes
//! the phase.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::protocol::PortPair;

use super::error::SessionError;
use super::track::Track;

/// Session role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRole {
    /// Local capture sent to a peer
    Playback,
    /// Media received from a remote publisher
    Ingest,
    /// A published stream re-sent to another peer
    Relay,
}

impl SessionRole {
    /// Whether this role sends media out
    pub fn is_sender(&self) -> bool {
        !matches!(self, SessionRole::Ingest)
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Constructed, nothing negotiated yet
    Created,
    /// Description returned to the client
    Described,
    /// Description received from the publisher
    Announced,
    /// Playing or recording
    Active,
    /// Resources released
    TornDown,
}

/// Protocol events that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Describe,
    Announce,
    Setup,
    Play,
    Record,
    Teardown,
}

/// State shared by every session role
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Role of this session
    pub role: SessionRole,

    /// Current phase
    pub phase: SessionPhase,

    /// Tracks keyed by index
    pub tracks: BTreeMap<u8, Track>,

    /// Creation time
    pub created_at: Instant,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, role: SessionRole, tracks: impl IntoIterator<Item = Track>) -> Self {
        Self {
            id,
            role,
            phase: SessionPhase::Created,
            tracks: tracks.into_iter().map(|t| (t.index, t)).collect(),
            created_at: Instant::now(),
        }
    }

    /// Compute the phase `event` leads to without applying it
    pub fn next_phase(&self, event: SessionEvent) -> Result<SessionPhase, SessionError> {
        use SessionEvent::*;
        use SessionPhase::*;

        let invalid = || SessionError::InvalidTransition {
            role: self.role,
            phase: self.phase,
            event,
        };

        if self.phase == TornDown {
            return Err(SessionError::TornDown(self.id));
        }

        match event {
            Teardown => Ok(TornDown),
            Describe if self.role.is_sender() && self.phase == Created => Ok(Described),
            Announce if !self.role.is_sender() && self.phase == Created => Ok(Announced),
            Setup if self.phase != Created => Ok(self.phase),
            Play if self.role.is_sender() && matches!(self.phase, Described | Active) => Ok(Active),
            Record if !self.role.is_sender() && matches!(self.phase, Announced | Active) => {
                Ok(Active)
            }
            _ => Err(invalid()),
        }
    }

    /// Apply `event`
    pub fn advance(&mut self, event: SessionEvent) -> Result<SessionPhase, SessionError> {
        let next = self.next_phase(event)?;
        if next != self.phase {
            tracing::debug!(
                session_id = self.id,
                role = ?self.role,
                from = ?self.phase,
                to = ?next,
                "Session transition"
            );
        }
        self.phase = next;
        Ok(next)
    }

    /// Configure a track from SETUP
    pub fn setup_track(&mut self, index: u8, remote: Option<PortPair>) -> Result<&Track, SessionError> {
        self.next_phase(SessionEvent::Setup)?;

        let track = self
            .tracks
            .get_mut(&index)
            .ok_or(SessionError::TrackNotFound(index))?;
        track.setup(remote);
        Ok(track)
    }

    /// Undo a SETUP whose transport failed to start
    pub fn release_track(&mut self, index: u8) {
        if let Some(track) = self.tracks.get_mut(&index) {
            track.release();
        }
    }

    /// Get a track by index
    pub fn track(&self, index: u8) -> Option<&Track> {
        self.tracks.get(&index)
    }

    /// Indices of tracks with live transports
    pub fn configured_tracks(&self) -> Vec<u8> {
        self.tracks
            .values()
            .filter(|t| t.is_configured())
            .map(|t| t.index)
            .collect()
    }

    /// Enter the terminal phase and release every track
    ///
    /// Returns the indices whose transports were live. Calling this again is
    /// a no-op returning nothing.
    pub fn tear_down(&mut self) -> Vec<u8> {
        if self.phase == SessionPhase::TornDown {
            return Vec::new();
        }

        let released = self.configured_tracks();
        for track in self.tracks.values_mut() {
            track.release();
        }
        self.phase = SessionPhase::TornDown;
        released
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn is_torn_down(&self) -> bool {
        self.phase == SessionPhase::TornDown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TrackKind;

    fn tracks() -> Vec<Track> {
        vec![
            Track::new(TrackKind::Audio, "m=audio 0 RTP/AVP 97\r\n", PortPair::new(6000, 6001)),
            Track::new(TrackKind::Video, "m=video 0 RTP/AVP 96\r\n", PortPair::new(6002, 6003)),
        ]
    }

    #[test]
    fn test_playback_lifecycle() {
        let mut state = SessionState::new(1, SessionRole::Playback, tracks());
        assert_eq!(state.phase, SessionPhase::Created);

        state.advance(SessionEvent::Describe).unwrap();
        assert_eq!(state.phase, SessionPhase::Described);

        state.setup_track(1, Some(PortPair::new(5000, 5001))).unwrap();
        assert_eq!(state.phase, SessionPhase::Described);

        state.advance(SessionEvent::Play).unwrap();
        assert!(state.is_active());

        // SETUP while active renegotiates ports
        state.setup_track(1, Some(PortPair::new(5004, 5005))).unwrap();
        assert!(state.is_active());
        assert_eq!(state.track(1).unwrap().remote_ports, PortPair::new(5004, 5005));

        assert_eq!(state.tear_down(), vec![1]);
        assert!(state.is_torn_down());
    }

    #[test]
    fn test_ingest_lifecycle() {
        let mut state = SessionState::new(2, SessionRole::Ingest, tracks());

        state.advance(SessionEvent::Announce).unwrap();
        state.setup_track(0, None).unwrap();
        state.advance(SessionEvent::Record).unwrap();

        assert!(state.is_active());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut ingest = SessionState::new(3, SessionRole::Ingest, tracks());
        ingest.advance(SessionEvent::Announce).unwrap();
        assert!(matches!(
            ingest.advance(SessionEvent::Play),
            Err(SessionError::InvalidTransition { .. })
        ));

        let mut relay = SessionState::new(4, SessionRole::Relay, tracks());
        relay.advance(SessionEvent::Describe).unwrap();
        assert!(matches!(
            relay.advance(SessionEvent::Record),
            Err(SessionError::InvalidTransition { .. })
        ));

        let created = SessionState::new(5, SessionRole::Playback, tracks());
        assert!(created.next_phase(SessionEvent::Setup).is_err());
    }

    #[test]
    fn test_unknown_track() {
        let mut state = SessionState::new(6, SessionRole::Relay, tracks());
        state.advance(SessionEvent::Describe).unwrap();

        let err = state.setup_track(7, None).unwrap_err();
        assert_eq!(err, SessionError::TrackNotFound(7));
    }

    #[test]
    fn test_torn_down_is_terminal() {
        let mut state = SessionState::new(7, SessionRole::Playback, tracks());
        state.advance(SessionEvent::Describe).unwrap();
        state.tear_down();

        assert_eq!(state.advance(SessionEvent::Play), Err(SessionError::TornDown(7)));
        assert!(state.tear_down().is_empty());
    }
}

//! Session error types

use crate::protocol::StatusCode;

use super::state::{SessionEvent, SessionPhase, SessionRole};

/// Error type for session transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session has already been torn down
    #[error("session {0} is torn down")]
    TornDown(u64),

    /// The event is not allowed for this role or phase
    #[error("{event:?} not allowed for {role:?} session in {phase:?}")]
    InvalidTransition {
        role: SessionRole,
        phase: SessionPhase,
        event: SessionEvent,
    },

    /// SETUP named a track the session does not have
    #[error("track {0} not found")]
    TrackNotFound(u8),
}

impl SessionError {
    /// Status code this error is answered with
    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::TrackNotFound(_) => StatusCode::NotFound,
            _ => StatusCode::BadRequest,
        }
    }
}

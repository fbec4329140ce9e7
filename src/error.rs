//! Error types
//!
//! Each layer has its own error enum; [`Error`] wraps them for callers that
//! cross layers (the server handle and the orchestrator).

use std::io;

use crate::peer::{DiscoveryError, LinkError};
use crate::protocol::constants::StatusCode;
use crate::registry::RegistryError;
use crate::session::SessionError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or listener failure
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Control-protocol failure
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Stream registry failure
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Session state machine failure
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Peer discovery service failure
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Link provisioning failure
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// A terminal callback did not arrive in time
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The multiplexing server loop is no longer running
    #[error("server stopped")]
    ServerStopped,
}

impl Error {
    /// Status code a request failing with this error is answered with
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Protocol(e) => e.status(),
            Error::Session(e) => e.status(),
            Error::Registry(RegistryError::AlreadyPublished(_)) => StatusCode::Forbidden,
            Error::Registry(RegistryError::StreamNotFound(_)) | Error::Io(_) => StatusCode::BadRequest,
            _ => StatusCode::InternalServerError,
        }
    }
}

/// Control-protocol errors, each tied to the status class it is answered with
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Request line could not be parsed
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    /// A header line or header value could not be parsed
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Request exceeded the configured size
    #[error("request too large: {0} bytes")]
    RequestTooLarge(usize),

    /// Method is not part of the protocol
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The path is not a valid stream identifier
    #[error("invalid stream identifier: {0:?}")]
    InvalidStreamId(String),

    /// SETUP without a usable `trackID=` selector
    #[error("missing or invalid track selector")]
    InvalidTrackSelector,

    /// Method needs a session and none resolved for the channel
    #[error("no session for request")]
    NoSession,

    /// Missing or wrong credentials
    #[error("unauthorized")]
    Unauthorized,

    /// Stream identifier is already published
    #[error("stream already published: {0}")]
    AlreadyPublished(String),

    /// Track index does not exist on the session
    #[error("track not found: {0}")]
    TrackNotFound(u8),
}

impl ProtocolError {
    /// Status code this error is answered with
    pub fn status(&self) -> StatusCode {
        match self {
            ProtocolError::Unauthorized => StatusCode::Unauthorized,
            ProtocolError::AlreadyPublished(_) => StatusCode::Forbidden,
            ProtocolError::TrackNotFound(_) => StatusCode::NotFound,
            _ => StatusCode::BadRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_status_classes() {
        assert_eq!(ProtocolError::NoSession.status(), StatusCode::BadRequest);
        assert_eq!(
            ProtocolError::UnknownMethod("GET".into()).status(),
            StatusCode::BadRequest
        );
        assert_eq!(ProtocolError::Unauthorized.status(), StatusCode::Unauthorized);
        assert_eq!(
            ProtocolError::AlreadyPublished("x".into()).status(),
            StatusCode::Forbidden
        );
        assert_eq!(ProtocolError::TrackNotFound(3).status(), StatusCode::NotFound);
    }

    #[test]
    fn test_error_from_io() {
        let err: Error = io::Error::new(io::ErrorKind::AddrInUse, "busy").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.status(), StatusCode::BadRequest);
    }

    #[test]
    fn test_error_status_mapping() {
        use crate::registry::StreamId;

        let id = StreamId::new_v4();
        assert_eq!(
            Error::from(RegistryError::AlreadyPublished(id)).status(),
            StatusCode::Forbidden
        );
        assert_eq!(
            Error::from(SessionError::TrackNotFound(2)).status(),
            StatusCode::NotFound
        );
        assert_eq!(Error::ServerStopped.status(), StatusCode::InternalServerError);
    }
}

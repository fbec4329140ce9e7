//! Control protocol (RTSP-style) wire handling
//!
//! This module provides:
//! - Request framing and parsing
//! - Response serialization
//! - URI path / track selector extraction
//! - `Transport` header negotiation helpers
//! - Session description parsing and building

pub mod constants;
pub mod request;
pub mod response;
pub mod sdp;
pub mod transport;
pub mod uri;

pub use constants::{Method, StatusCode};
pub use request::{RequestDecoder, RtspRequest};
pub use response::RtspResponse;
pub use sdp::{AnnouncedDescription, MediaDescription, SessionDescription, TrackKind};
pub use transport::{PortPair, TransportMode, TransportReply};

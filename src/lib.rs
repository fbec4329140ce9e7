//! Peer-to-peer RTSP relay
//!
//! A device runs one [`RelayServer`] that answers RTSP-style control
//! requests on a local listener and on one accepting channel per connected
//! peer. Each channel can hold a local playback session, any number of
//! ingest sessions fed by remote publishers, and a relay session that
//! forwards a published stream to another peer.
//!
//! - [`protocol`]: request framing, responses, transport and SDP helpers
//! - [`engine`]: request processing and session lifecycle
//! - [`session`]: per-role session state
//! - [`registry`]: streams published through this device
//! - [`server`]: the multiplexing server loop and its handle
//! - [`peer`]: discovery, handshake throttling and link provisioning
//!
//! # Example
//!
//! ```no_run
//! use std::io;
//! use rtsp_relay::media::{CaptureTrack, MediaBackend, TrackStart};
//! use rtsp_relay::{RelayServer, ServerConfig};
//!
//! struct Camera;
//!
//! impl MediaBackend for Camera {
//!     fn configure_capture(&self) -> io::Result<Vec<CaptureTrack>> {
//!         Ok(Vec::new())
//!     }
//!     fn start_track(&self, _start: &TrackStart<'_>) -> io::Result<()> {
//!         Ok(())
//!     }
//!     fn stop_track(&self, _session_id: u64, _index: u8) {}
//! }
//!
//! # async fn example() -> rtsp_relay::Result<()> {
//! let server = RelayServer::spawn(ServerConfig::default(), Camera);
//! server.start()?;
//! server.add_listener("127.0.0.1:1234".parse().unwrap()).await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod media;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use engine::ProtocolEngine;
pub use error::{Error, Result};
pub use peer::{OrchestratorConfig, PeerOrchestrator};
pub use registry::{StreamId, StreamRegistry};
pub use server::{RelayServer, ServerConfig, ServerHandle};

//! Multiplexing relay server
//!
//! # Example
//!
//! ```no_run
//! use std::io;
//! use rtsp_relay::media::{CaptureTrack, MediaBackend, TrackStart};
//! use rtsp_relay::server::{RelayServer, ServerConfig};
//!
//! struct NoCapture;
//!
//! impl MediaBackend for NoCapture {
//!     fn configure_capture(&self) -> io::Result<Vec<CaptureTrack>> {
//!         Ok(Vec::new())
//!     }
//!     fn start_track(&self, _start: &TrackStart<'_>) -> io::Result<()> {
//!         Ok(())
//!     }
//!     fn stop_track(&self, _session_id: u64, _index: u8) {}
//! }
//!
//! # async fn example() -> rtsp_relay::error::Result<()> {
//! let config = ServerConfig::default();
//! let bind_addr = config.bind_addr;
//! let server = RelayServer::spawn(config, NoCapture);
//!
//! server.start()?;
//! let addr = server.add_listener(bind_addr).await?;
//! println!("listening on {addr}");
//! # Ok(())
//! # }
//! ```

pub mod change;
pub mod config;
pub mod handle;
pub mod listener;

pub use change::{ChangeRequest, ConnectionStatus};
pub use config::{Credentials, ServerConfig};
pub use handle::ServerHandle;
pub use listener::RelayServer;

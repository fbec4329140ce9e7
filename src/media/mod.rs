//! Media layer seam
//!
//! The relay never touches RTP packets itself. Capture description and the
//! per-track senders / receivers live behind [`MediaBackend`], which the
//! protocol engine drives from DESCRIBE, SETUP and TEARDOWN.

pub mod backend;

pub use backend::{CaptureTrack, MediaBackend, TrackStart};

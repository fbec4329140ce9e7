//! Protocol engine
//!
//! Turns parsed control requests into session state changes and responses.
//!
//! Request resolution, per channel:
//!
//! 1. the channel's playback session, if any
//! 2. the ingest session whose stream id equals the request path
//! 3. the channel's relay session
//!
//! DESCRIBE and ANNOUNCE create sessions instead of resolving them.

pub mod auth;
pub mod processor;


pub use processor::ProtocolEngine;

//! Session management
//!
//! Each control channel owns a [`ChannelSessions`] table holding its
//! playback, ingest and relay sessions. All three roles share the
//! [`SessionState`] machine and differ only in where media comes from and
//! goes to.

pub mod context;
pub mod error;
pub mod ingest;
pub mod playback;
pub mod ports;
pub mod relay;
pub mod state;
pub mod table;
pub mod track;

pub use context::{ChannelContext, ChannelId};
pub use error::SessionError;
pub use ingest::IngestSession;
pub use playback::PlaybackSession;
pub use ports::PortAllocator;
pub use relay::RelaySession;
pub use state::{SessionEvent, SessionPhase, SessionRole, SessionState};
pub use table::{ChannelSessions, RemovedSession, SessionSlot};
pub use track::Track;

//! Stream registry for cross-peer lookup
//!
//! The registry lists the streams currently published through this device.
//! It is the only structure touched from more than one task, so every access
//! goes through the registry's lock.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<StreamRegistry>
//!                   ┌───────────────────────────┐
//!                   │ streams: HashMap<StreamId,│
//!                   │   Arc<Streaming {         │
//!                   │     source: Arc<Source>,  │
//!                   │   }>                      │
//!                   │ >                         │
//!                   └────────────┬──────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Ingest session]       [Relay session]          [UI listing]
//!   RECORD -> add()        DESCRIBE -> get()        list(), subscribe()
//!   TEARDOWN -> remove()
//! ```

pub mod entry;
pub mod error;
pub mod key;
pub mod store;

pub use entry::{RegistryEvent, SourceTrack, StreamSource, Streaming};
pub use error::RegistryError;
pub use key::StreamId;
pub use store::StreamRegistry;

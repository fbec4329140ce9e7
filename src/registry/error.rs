//! Registry error types
//!
//! Error types for stream registry operations.

use super::key::StreamId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Stream not found
    #[error("Stream not found: {0}")]
    StreamNotFound(StreamId),

    /// Stream identifier already published
    #[error("Stream already published: {0}")]
    AlreadyPublished(StreamId),
}

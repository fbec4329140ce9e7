//! Stream registry implementation
//!
//! The process-wide catalog of published streams. Ingest sessions add their
//! entry on RECORD and remove it on TEARDOWN or disconnect; relay sessions
//! look entries up on DESCRIBE; outer layers list it and watch for changes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use super::entry::{RegistryEvent, Streaming};
use super::error::RegistryError;
use super::key::StreamId;

const EVENT_CAPACITY: usize = 64;

/// Central registry for all published streams
///
/// Every lookup and mutation goes through a single `RwLock`.
#[derive(Debug)]
pub struct StreamRegistry {
    /// Map of stream id to entry
    streams: RwLock<HashMap<StreamId, Arc<Streaming>>>,

    /// Change notifications
    events: broadcast::Sender<RegistryEvent>,
}

impl StreamRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            streams: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Publish a stream
    ///
    /// Returns an error if the identifier is already published; the existing
    /// entry is left untouched.
    pub async fn add(&self, streaming: Streaming) -> Result<Arc<Streaming>, RegistryError> {
        let mut streams = self.streams.write().await;

        if streams.contains_key(&streaming.id) {
            return Err(RegistryError::AlreadyPublished(streaming.id));
        }

        let entry = Arc::new(streaming);
        streams.insert(entry.id, Arc::clone(&entry));
        drop(streams);

        tracing::info!(
            stream = %entry.id,
            name = %entry.name,
            session_id = entry.owner_session(),
            "Stream published"
        );
        let _ = self.events.send(RegistryEvent::Added {
            id: entry.id,
            name: entry.name.clone(),
        });

        Ok(entry)
    }

    /// Remove a stream regardless of owner
    pub async fn remove(&self, id: &StreamId) -> Option<Arc<Streaming>> {
        let removed = self.streams.write().await.remove(id);

        if removed.is_some() {
            tracing::info!(stream = %id, "Stream removed");
            let _ = self.events.send(RegistryEvent::Removed { id: *id });
        }

        removed
    }

    /// Remove a stream only if it is still owned by `session_id`
    pub async fn remove_owned(&self, id: &StreamId, session_id: u64) -> Option<Arc<Streaming>> {
        let mut streams = self.streams.write().await;

        match streams.get(id) {
            Some(entry) if entry.owner_session() == session_id => {}
            Some(entry) => {
                tracing::warn!(
                    stream = %id,
                    expected = entry.owner_session(),
                    actual = session_id,
                    "Stream owner mismatch, not removing"
                );
                return None;
            }
            None => return None,
        }

        let removed = streams.remove(id);
        drop(streams);

        tracing::info!(stream = %id, session_id = session_id, "Stream removed");
        let _ = self.events.send(RegistryEvent::Removed { id: *id });

        removed
    }

    /// Look up a stream
    pub async fn get(&self, id: &StreamId) -> Option<Arc<Streaming>> {
        self.streams.read().await.get(id).cloned()
    }

    /// Check whether a stream is published
    pub async fn contains(&self, id: &StreamId) -> bool {
        self.streams.read().await.contains_key(id)
    }

    /// All published streams, oldest first
    pub async fn list(&self) -> Vec<Arc<Streaming>> {
        let mut streams: Vec<_> = self.streams.read().await.values().cloned().collect();
        streams.sort_by_key(|s| s.published_at);
        streams
    }

    /// Number of published streams
    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }

    /// Mark whether a local consumer is downloading a stream
    pub async fn set_downloading(&self, id: &StreamId, downloading: bool) -> Result<(), RegistryError> {
        let streams = self.streams.read().await;
        let entry = streams.get(id).ok_or(RegistryError::StreamNotFound(*id))?;
        entry.set_downloading(downloading);
        Ok(())
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

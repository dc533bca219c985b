//! Stream registry: the name → stream map behind every command.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

use super::stream::Stream;

/// Owns all streams. Streams are created lazily on first write-side
/// reference and live until explicitly removed.
#[derive(Default)]
pub struct StreamRegistry {
    streams: DashMap<Bytes, Arc<Stream>>,
}

impl StreamRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the named stream, creating it if absent
    pub fn get_or_create(&self, name: &Bytes) -> Arc<Stream> {
        self.streams
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Stream::new()))
            .value()
            .clone()
    }

    /// Return the named stream without creating it
    pub fn get(&self, name: &Bytes) -> Option<Arc<Stream>> {
        self.streams.get(name).map(|entry| entry.value().clone())
    }

    /// Remove a stream, destroying its groups and their PELs.
    /// Returns true if the stream existed.
    pub fn remove(&self, name: &Bytes) -> bool {
        self.streams.remove(name).is_some()
    }

    /// Number of streams currently held
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether the registry holds no streams
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

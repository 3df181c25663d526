//! Era-agnostic ordered read view over one uri.

use crate::era::Era;
use crate::error::{CoreError, CoreResult};
use crate::storage::ChunkStorage;
use std::sync::Arc;

/// A read view over one uri across an inclusive circular era range.
///
/// The cache aggregates every message the scope holds for its uri within
/// `[from_era, to_era]` (walked along the circular sequence, oldest era
/// first) and presents them as one flat, randomly addressable list. Era
/// boundaries disappear behind it.
///
/// The cache does not own chunk data and is allowed to be stale: after the
/// underlying storage changes, the owner must call [`ChunkCache::sync`]
/// before reads reflect the change.
///
/// Iteration via [`ChunkCache::messages`] is chronological: the oldest
/// message comes first. [`ChunkCache::message_at`] offers both directions.
///
/// # Thread Safety
///
/// A cache is a single-owner value; `sync` and reads must not race. Share
/// it across threads only behind external locking.
pub struct ChunkCache {
    storage: Arc<dyn ChunkStorage>,
    uri: String,
    from_era: Era,
    to_era: Era,
    messages: Vec<Vec<u8>>,
}

impl ChunkCache {
    /// Builds a cache over `uri` within `[from_era, to_era]` and fills it
    /// from the storage.
    ///
    /// # Errors
    ///
    /// Returns an I/O or corruption error if the storage cannot be read.
    pub fn new(
        storage: Arc<dyn ChunkStorage>,
        uri: impl Into<String>,
        from_era: Era,
        to_era: Era,
    ) -> CoreResult<Self> {
        let mut cache = Self {
            storage,
            uri: uri.into(),
            from_era,
            to_era,
            messages: Vec::new(),
        };
        cache.sync()?;
        Ok(cache)
    }

    /// Returns the uri this cache aggregates.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the inclusive era range `(from, to)` of this cache.
    #[must_use]
    pub fn era_range(&self) -> (Era, Era) {
        (self.from_era, self.to_era)
    }

    /// Number of messages as of the last [`ChunkCache::sync`]. No I/O.
    #[must_use]
    pub fn size(&self) -> usize {
        self.messages.len()
    }

    /// Authoritative message count, re-derived from the storage.
    ///
    /// Unlike [`ChunkCache::size`] this reads the backing medium and sees
    /// changes the cache has not synchronized yet.
    ///
    /// # Errors
    ///
    /// Returns an I/O or corruption error if the storage cannot be read.
    pub fn message_count(&self) -> CoreResult<usize> {
        let mut count = 0;
        for era in self.from_era.range_to(self.to_era) {
            count += self.storage.chunk(&self.uri, era)?.message_count();
        }
        Ok(count)
    }

    /// Iterates all cached messages chronologically, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &[u8]> {
        self.messages.iter().map(Vec::as_slice)
    }

    /// Random access into the cached messages.
    ///
    /// With `chronologically` set, position 0 is the oldest message;
    /// otherwise position 0 is the newest.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MessageNotFound`] when `position` is outside
    /// `[0, size())`.
    pub fn message_at(&self, position: usize, chronologically: bool) -> CoreResult<&[u8]> {
        let size = self.messages.len();
        let index = if chronologically {
            position
        } else {
            size.checked_sub(position.saturating_add(1)).unwrap_or(size)
        };
        self.messages
            .get(index)
            .map(Vec::as_slice)
            .ok_or(CoreError::MessageNotFound { position, size })
    }

    /// Recomputes the cache contents from the underlying storage.
    ///
    /// Must be called after any storage mutation that should become
    /// visible; until then reads serve the previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns an I/O or corruption error if the storage cannot be read.
    pub fn sync(&mut self) -> CoreResult<()> {
        let mut messages = Vec::new();
        for era in self.from_era.range_to(self.to_era) {
            let chunk = self.storage.chunk(&self.uri, era)?;
            messages.extend(chunk.messages().iter().cloned());
        }
        self.messages = messages;
        Ok(())
    }
}

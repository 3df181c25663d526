//! Scoped chunk storage.
//!
//! A chunk storage is one scope of the store: either the local outgoing
//! scope or the incoming scope of one remote sender. It owns the mapping
//! from `(uri, era)` to chunk and the enumeration of everything produced in
//! one era, which is what the synchronization layer transmits in one
//! encounter round.
//!
//! # Invariants
//!
//! - A chunk exists on the backing medium for `(uri, era)` iff a message
//!   was appended under that uri during that era, or recipients were
//!   explicitly set for it. Plain reads never create chunks.
//! - `drop_chunks` is idempotent; retiring an era twice is a no-op.
//! - Within one scope, writers and era-enumeration reads are serialized
//!   against each other by the implementation.

mod fs;
mod memory;

pub use fs::FsChunkStorage;
pub use memory::MemoryChunkStorage;

use crate::cache::ChunkCache;
use crate::chunk::Chunk;
use crate::era::Era;
use crate::error::CoreResult;
use std::sync::Arc;

/// Whether a storage scope accepts mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Reads only; mutating operations fail with a read-only error.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

/// One scope of era-partitioned chunk storage.
///
/// Implementations are safe to share across threads; each serializes its
/// own writers against readers of the current era.
pub trait ChunkStorage: Send + Sync {
    /// Returns whether this scope accepts mutations.
    fn mode(&self) -> StorageMode;

    /// Returns the chunk stored under `(uri, era)`.
    ///
    /// If nothing was stored, returns an empty chunk rather than an error;
    /// absence of data is not a fault. The returned chunk is a snapshot,
    /// not a live handle.
    fn chunk(&self, uri: &str, era: Era) -> CoreResult<Chunk>;

    /// True when a chunk was persisted under `(uri, era)`.
    fn contains(&self, uri: &str, era: Era) -> CoreResult<bool>;

    /// Returns every chunk of the given era, across all uris, ordered by uri.
    fn chunks(&self, era: Era) -> CoreResult<Vec<Chunk>>;

    /// Stores a complete chunk, replacing any previous one under its key.
    ///
    /// Used by the synchronization layer to deposit chunks received from a
    /// remote sender.
    fn put_chunk(&self, chunk: &Chunk) -> CoreResult<()>;

    /// Appends a message payload to the chunk under `(uri, era)`, creating
    /// the chunk on first write.
    fn append_message(&self, uri: &str, era: Era, payload: &[u8]) -> CoreResult<()>;

    /// Adds a recipient to the chunk under `(uri, era)`. Idempotent.
    fn add_recipient(&self, uri: &str, era: Era, recipient: &str) -> CoreResult<()>;

    /// Replaces the recipient set of the chunk under `(uri, era)`.
    fn set_recipients(&self, uri: &str, era: Era, recipients: &[String]) -> CoreResult<()>;

    /// Removes a recipient from the chunk under `(uri, era)` if present.
    fn remove_recipient(&self, uri: &str, era: Era, recipient: &str) -> CoreResult<()>;

    /// Removes every chunk tagged with the given era.
    ///
    /// Idempotent: retiring an era that holds no chunks is a no-op.
    /// Deletion is best-effort; when some entries cannot be removed the
    /// rest are still attempted and an aggregate failure is reported.
    fn drop_chunks(&self, era: Era) -> CoreResult<()>;

    /// Builds a [`ChunkCache`] aggregating `uri` over the inclusive
    /// circular era range `[from_era, to_era]`.
    ///
    /// # Errors
    ///
    /// Returns an I/O or corruption error if the scope cannot be read.
    fn chunk_cache(
        self: Arc<Self>,
        uri: &str,
        from_era: Era,
        to_era: Era,
    ) -> CoreResult<ChunkCache>
    where
        Self: Sized + 'static,
    {
        ChunkCache::new(self, uri, from_era, to_era)
    }
}

//! In-memory chunk storage for tests and ephemeral scopes.

use crate::chunk::Chunk;
use crate::era::Era;
use crate::error::CoreResult;
use crate::storage::{ChunkStorage, StorageMode};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory chunk storage scope.
///
/// Holds chunks in a map keyed by `(era, uri)`. Suitable for unit tests,
/// cache tests, and ephemeral stores that do not need persistence.
///
/// # Thread Safety
///
/// All operations go through an internal lock; the scope can be shared
/// across threads.
#[derive(Debug, Default)]
pub struct MemoryChunkStorage {
    chunks: RwLock<BTreeMap<(u32, String), Chunk>>,
}

impl MemoryChunkStorage {
    /// Creates a new empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, uri: &str, era: Era, mutate: F) -> CoreResult<()>
    where
        F: FnOnce(&mut Chunk),
    {
        let mut chunks = self.chunks.write();
        let chunk = chunks
            .entry((era.as_u32(), uri.to_string()))
            .or_insert_with(|| Chunk::new(uri, era));
        mutate(chunk);
        Ok(())
    }
}

impl ChunkStorage for MemoryChunkStorage {
    fn mode(&self) -> StorageMode {
        StorageMode::ReadWrite
    }

    fn chunk(&self, uri: &str, era: Era) -> CoreResult<Chunk> {
        let chunks = self.chunks.read();
        Ok(chunks
            .get(&(era.as_u32(), uri.to_string()))
            .cloned()
            .unwrap_or_else(|| Chunk::new(uri, era)))
    }

    fn contains(&self, uri: &str, era: Era) -> CoreResult<bool> {
        Ok(self
            .chunks
            .read()
            .contains_key(&(era.as_u32(), uri.to_string())))
    }

    fn chunks(&self, era: Era) -> CoreResult<Vec<Chunk>> {
        let chunks = self.chunks.read();
        Ok(chunks
            .iter()
            .filter(|((e, _), _)| *e == era.as_u32())
            .map(|(_, chunk)| chunk.clone())
            .collect())
    }

    fn put_chunk(&self, chunk: &Chunk) -> CoreResult<()> {
        self.chunks.write().insert(
            (chunk.era().as_u32(), chunk.uri().to_string()),
            chunk.clone(),
        );
        Ok(())
    }

    fn append_message(&self, uri: &str, era: Era, payload: &[u8]) -> CoreResult<()> {
        let payload = payload.to_vec();
        self.update(uri, era, |chunk| chunk.add_message(payload))
    }

    fn add_recipient(&self, uri: &str, era: Era, recipient: &str) -> CoreResult<()> {
        self.update(uri, era, |chunk| {
            chunk.add_recipient(recipient);
        })
    }

    fn set_recipients(&self, uri: &str, era: Era, recipients: &[String]) -> CoreResult<()> {
        self.update(uri, era, |chunk| {
            chunk.set_recipients(recipients.iter().cloned());
        })
    }

    fn remove_recipient(&self, uri: &str, era: Era, recipient: &str) -> CoreResult<()> {
        self.update(uri, era, |chunk| {
            chunk.remove_recipient(recipient);
        })
    }

    fn drop_chunks(&self, era: Era) -> CoreResult<()> {
        self.chunks.write().retain(|&(e, _), _| e != era.as_u32());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_chunk_reads_empty() {
        let storage = MemoryChunkStorage::new();
        assert!(storage.chunk("u", Era::ZERO).unwrap().is_empty());
        assert!(!storage.contains("u", Era::ZERO).unwrap());
    }

    #[test]
    fn append_then_enumerate() {
        let storage = MemoryChunkStorage::new();
        storage.append_message("b", Era::ZERO, b"x").unwrap();
        storage.append_message("a", Era::ZERO, b"y").unwrap();
        storage.append_message("a", Era::new(2), b"z").unwrap();

        let uris: Vec<String> = storage
            .chunks(Era::ZERO)
            .unwrap()
            .iter()
            .map(|chunk| chunk.uri().to_string())
            .collect();
        assert_eq!(uris, vec!["a", "b"]);
    }

    #[test]
    fn drop_is_idempotent() {
        let storage = MemoryChunkStorage::new();
        storage.append_message("u", Era::ZERO, b"m").unwrap();

        storage.drop_chunks(Era::ZERO).unwrap();
        storage.drop_chunks(Era::ZERO).unwrap();
        assert!(storage.chunks(Era::ZERO).unwrap().is_empty());
    }

    #[test]
    fn put_chunk_replaces() {
        let storage = MemoryChunkStorage::new();
        let mut chunk = Chunk::new("u", Era::ZERO);
        chunk.add_message(b"old".to_vec());
        storage.put_chunk(&chunk).unwrap();

        let mut newer = Chunk::new("u", Era::ZERO);
        newer.add_message(b"new".to_vec());
        storage.put_chunk(&newer).unwrap();

        assert_eq!(
            storage.chunk("u", Era::ZERO).unwrap().messages(),
            &[b"new".to_vec()]
        );
    }
}

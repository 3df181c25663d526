//! File-system-backed chunk storage.

use crate::chunk::Chunk;
use crate::dir::escape_component;
use crate::era::Era;
use crate::error::{CoreError, CoreResult};
use crate::storage::{ChunkStorage, StorageMode};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// File extension of serialized chunks.
const CHUNK_EXT: &str = "chunk";

/// A chunk storage scope backed by a directory tree.
///
/// Each era maps to a subdirectory named by its decimal number; each chunk
/// maps to one file named by the escaped uri. Chunk writes go through a
/// temporary file and an atomic rename, so readers never observe a chunk
/// mid-write.
///
/// # Thread Safety
///
/// All operations take an internal lock, serializing writers and
/// era-enumeration reads within this scope. Distinct scopes are fully
/// independent and may be driven concurrently.
#[derive(Debug)]
pub struct FsChunkStorage {
    root: PathBuf,
    mode: StorageMode,
    /// Serializes read-modify-write cycles and enumeration against drops.
    guard: Mutex<()>,
}

impl FsChunkStorage {
    /// Opens a writable scope, creating its directory if missing.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn open(root: &Path) -> CoreResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            mode: StorageMode::ReadWrite,
            guard: Mutex::new(()),
        })
    }

    /// Opens a read-only view of a scope.
    ///
    /// The directory does not have to exist; reads over a missing scope
    /// yield empty results.
    #[must_use]
    pub fn open_read_only(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            mode: StorageMode::ReadOnly,
            guard: Mutex::new(()),
        }
    }

    /// Returns the scope's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn era_dir(&self, era: Era) -> PathBuf {
        self.root.join(era.as_u32().to_string())
    }

    fn chunk_path(&self, uri: &str, era: Era) -> PathBuf {
        self.era_dir(era)
            .join(format!("{}.{CHUNK_EXT}", escape_component(uri)))
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        match self.mode {
            StorageMode::ReadWrite => Ok(()),
            StorageMode::ReadOnly => Err(CoreError::StorageReadOnly),
        }
    }

    /// Loads the chunk at `path`, or an empty chunk when the file is absent.
    fn load_chunk(&self, path: &Path, uri: &str, era: Era) -> CoreResult<Chunk> {
        if !path.exists() {
            return Ok(Chunk::new(uri, era));
        }
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        Chunk::decode(&data)
    }

    /// Writes a chunk via temp-file-then-rename so a crash mid-write never
    /// leaves a half-written chunk behind.
    fn store_chunk(&self, chunk: &Chunk) -> CoreResult<()> {
        let path = self.chunk_path(chunk.uri(), chunk.era());
        let era_dir = self.era_dir(chunk.era());
        fs::create_dir_all(&era_dir)?;

        let temp_path = path.with_extension("tmp");
        let data = chunk.encode();
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    /// Loads, mutates, and atomically rewrites one chunk.
    fn update_chunk<F>(&self, uri: &str, era: Era, mutate: F) -> CoreResult<()>
    where
        F: FnOnce(&mut Chunk),
    {
        self.ensure_writable()?;
        let _guard = self.guard.lock();

        let path = self.chunk_path(uri, era);
        let mut chunk = self.load_chunk(&path, uri, era)?;
        mutate(&mut chunk);
        self.store_chunk(&chunk)
    }
}

impl ChunkStorage for FsChunkStorage {
    fn mode(&self) -> StorageMode {
        self.mode
    }

    fn chunk(&self, uri: &str, era: Era) -> CoreResult<Chunk> {
        let _guard = self.guard.lock();
        self.load_chunk(&self.chunk_path(uri, era), uri, era)
    }

    fn contains(&self, uri: &str, era: Era) -> CoreResult<bool> {
        Ok(self.chunk_path(uri, era).exists())
    }

    fn chunks(&self, era: Era) -> CoreResult<Vec<Chunk>> {
        let _guard = self.guard.lock();

        let era_dir = self.era_dir(era);
        if !era_dir.exists() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        for entry in fs::read_dir(&era_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CHUNK_EXT) {
                continue;
            }
            let mut data = Vec::new();
            File::open(&path)?.read_to_end(&mut data)?;
            chunks.push(Chunk::decode(&data)?);
        }

        chunks.sort_by(|a, b| a.uri().cmp(b.uri()));
        Ok(chunks)
    }

    fn put_chunk(&self, chunk: &Chunk) -> CoreResult<()> {
        self.ensure_writable()?;
        let _guard = self.guard.lock();
        self.store_chunk(chunk)
    }

    fn append_message(&self, uri: &str, era: Era, payload: &[u8]) -> CoreResult<()> {
        let payload = payload.to_vec();
        self.update_chunk(uri, era, |chunk| chunk.add_message(payload))
    }

    fn add_recipient(&self, uri: &str, era: Era, recipient: &str) -> CoreResult<()> {
        self.update_chunk(uri, era, |chunk| {
            chunk.add_recipient(recipient);
        })
    }

    fn set_recipients(&self, uri: &str, era: Era, recipients: &[String]) -> CoreResult<()> {
        self.update_chunk(uri, era, |chunk| {
            chunk.set_recipients(recipients.iter().cloned());
        })
    }

    fn remove_recipient(&self, uri: &str, era: Era, recipient: &str) -> CoreResult<()> {
        self.update_chunk(uri, era, |chunk| {
            chunk.remove_recipient(recipient);
        })
    }

    fn drop_chunks(&self, era: Era) -> CoreResult<()> {
        self.ensure_writable()?;
        let _guard = self.guard.lock();

        let era_dir = self.era_dir(era);
        if !era_dir.exists() {
            return Ok(());
        }

        let mut failed = 0usize;
        let mut first_error: Option<std::io::Error> = None;
        for entry in fs::read_dir(&era_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    failed += 1;
                    first_error.get_or_insert(err);
                    continue;
                }
            };
            if let Err(err) = fs::remove_file(entry.path()) {
                failed += 1;
                first_error.get_or_insert(err);
            }
        }

        if failed > 0 {
            let detail = first_error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            tracing::warn!(era = era.as_u32(), failed, "era retirement incomplete");
            return Err(CoreError::DropIncomplete { era, failed, detail });
        }

        fs::remove_dir(&era_dir)?;
        Ok(())
    }
}

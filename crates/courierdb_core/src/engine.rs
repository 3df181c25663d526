//! Engine: composition root binding storage scopes, state, and persistence.

use crate::cache::ChunkCache;
use crate::dir::StoreDir;
use crate::era::Era;
use crate::error::CoreResult;
use crate::memento::Memento;
use crate::state::EngineState;
use crate::storage::{ChunkStorage, FsChunkStorage};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// The store-and-forward engine over one store root.
///
/// The engine owns the local outgoing scope, a registry of incoming scopes
/// (one per remote sender), and the durable engine state. Applications
/// append messages and manage recipients; the synchronization layer pulls
/// whole eras from the local scope and deposits received chunks into
/// per-sender scopes.
///
/// # Concurrency
///
/// Engine state mutations go through a single write lock, and era reads
/// observe a consistent pairing of the two counters. Message appends hold
/// the state read lock so an era rotation cannot slip in between reading
/// the current era and writing the chunk.
pub struct Engine {
    dir: StoreDir,
    memento: Memento,
    state: RwLock<EngineState>,
    local: Arc<FsChunkStorage>,
    incoming: Mutex<BTreeMap<String, Arc<FsChunkStorage>>>,
}

impl Engine {
    /// Opens the engine over a store root, creating it on first use.
    ///
    /// Restores persisted state when a record exists; otherwise starts from
    /// defaults. The store stays unattributed until an owner is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::StoreLocked`] when another process holds
    /// the root, [`crate::CoreError::StateCorrupted`] when the persisted
    /// record does not parse, and I/O errors from the backing medium.
    pub fn open(path: &Path) -> CoreResult<Self> {
        let dir = StoreDir::open(path)?;
        let memento = Memento::new(dir.state_path(), dir.state_temp_path());
        let state = memento.restore()?;
        let local = Arc::new(FsChunkStorage::open(&dir.local_dir())?);

        tracing::debug!(
            root = %dir.path().display(),
            era = state.era().as_u32(),
            oldest = state.oldest_era().as_u32(),
            "store opened"
        );

        Ok(Self {
            dir,
            memento,
            state: RwLock::new(state),
            local,
            incoming: Mutex::new(BTreeMap::new()),
        })
    }

    /// Opens the engine and attributes it to `owner`.
    ///
    /// A fresh or sentinel-owned store becomes owned by `owner` and the
    /// attribution is persisted immediately. Supplying the recorded owner
    /// again, or a sentinel value, is a no-op.
    ///
    /// # Errors
    ///
    /// In addition to the [`Engine::open`] errors, returns
    /// [`crate::CoreError::OwnershipConflict`] when the store is already
    /// owned by a different concrete owner; the persisted record is left
    /// untouched in that case.
    pub fn open_with_owner(path: &Path, owner: &str) -> CoreResult<Self> {
        let engine = Self::open(path)?;
        {
            let mut state = engine.state.write();
            let mut next = state.clone();
            if next.attribute_owner(owner)? {
                engine.memento.save(&next)?;
                *state = next;
            }
        }
        Ok(engine)
    }

    /// Returns the recorded owner identity.
    #[must_use]
    pub fn owner(&self) -> String {
        self.state.read().owner().to_string()
    }

    /// Returns the protocol format tag.
    #[must_use]
    pub fn format(&self) -> String {
        self.state.read().format().to_string()
    }

    /// Sets the protocol format tag and persists the change.
    ///
    /// The tag is opaque to the core; the protocol layer owns its meaning.
    pub fn set_format(&self, format: &str) -> CoreResult<()> {
        let mut state = self.state.write();
        let mut next = state.clone();
        next.set_format(format);
        self.memento.save(&next)?;
        *state = next;
        Ok(())
    }

    /// Returns the current writable era.
    #[must_use]
    pub fn era(&self) -> Era {
        self.state.read().era()
    }

    /// Returns the oldest era still retained.
    #[must_use]
    pub fn oldest_era(&self) -> Era {
        self.state.read().oldest_era()
    }

    /// Returns `(oldest_era, era)` as one consistent snapshot.
    #[must_use]
    pub fn era_window(&self) -> (Era, Era) {
        let state = self.state.read();
        (state.oldest_era(), state.era())
    }

    /// Closes the current era and opens the next one, persisting the state.
    ///
    /// Returns the era that was closed. Chunks of closed eras stay
    /// available until retired; retention is a separate, caller-driven
    /// decision.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the state cannot be persisted; the
    /// in-memory era is unchanged in that case.
    pub fn new_era(&self) -> CoreResult<Era> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let closed = next.advance_era();
        self.memento.save(&next)?;
        *state = next;

        tracing::debug!(closed = closed.as_u32(), current = state.era().as_u32(), "era rotated");
        Ok(closed)
    }

    /// Drops all local chunks of the oldest era and advances the retention
    /// boundary, persisting the state.
    ///
    /// Returns the retired era, or `None` when `oldest_era` has caught up
    /// with the current era; the boundary never advances past it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::DropIncomplete`] when some chunks could
    /// not be removed (the boundary does not advance then), and I/O errors
    /// from deletion or persistence.
    pub fn retire_oldest_era(&self) -> CoreResult<Option<Era>> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let Some(retired) = next.advance_oldest_era() else {
            return Ok(None);
        };

        self.local.drop_chunks(retired)?;
        self.memento.save(&next)?;
        *state = next;

        tracing::debug!(retired = retired.as_u32(), "oldest era retired");
        Ok(Some(retired))
    }

    /// Appends a message payload under `uri` in the current era, creating
    /// the chunk on first write.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the chunk cannot be written.
    pub fn add(&self, uri: &str, message: &[u8]) -> CoreResult<()> {
        let state = self.state.read();
        self.local.append_message(uri, state.era(), message)
    }

    /// Adds a recipient to the current live chunk of `uri`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the chunk cannot be written.
    pub fn add_recipient(&self, uri: &str, recipient: &str) -> CoreResult<()> {
        let state = self.state.read();
        self.local.add_recipient(uri, state.era(), recipient)
    }

    /// Replaces the recipient set on the current live chunk of `uri`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the chunk cannot be written.
    pub fn set_recipients(&self, uri: &str, recipients: &[String]) -> CoreResult<()> {
        let state = self.state.read();
        self.local.set_recipients(uri, state.era(), recipients)
    }

    /// Removes a recipient from the current live chunk of `uri`; no-op when
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the chunk cannot be written.
    pub fn remove_recipient(&self, uri: &str, recipient: &str) -> CoreResult<()> {
        let state = self.state.read();
        self.local.remove_recipient(uri, state.era(), recipient)
    }

    /// Returns the last era synchronized with `peer`, if any.
    #[must_use]
    pub fn last_seen(&self, peer: &str) -> Option<Era> {
        self.state.read().last_seen(peer)
    }

    /// Records the last era synchronized with `peer` and persists it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the state cannot be persisted.
    pub fn set_last_seen(&self, peer: &str, era: Era) -> CoreResult<()> {
        let mut state = self.state.write();
        let mut next = state.clone();
        next.set_last_seen(peer, era);
        self.memento.save(&next)?;
        *state = next;
        Ok(())
    }

    /// Returns every peer with a recorded synchronization era.
    #[must_use]
    pub fn peers_seen(&self) -> Vec<(String, Era)> {
        self.state
            .read()
            .peers_seen()
            .map(|(peer, era)| (peer.to_string(), era))
            .collect()
    }

    /// Returns the local outgoing chunk storage scope.
    #[must_use]
    pub fn chunk_storage(&self) -> Arc<FsChunkStorage> {
        Arc::clone(&self.local)
    }

    /// Returns the incoming scope dedicated to one remote sender, creating
    /// it on first use.
    ///
    /// Repeated requests for the same sender return the same handle; a
    /// sender is never silently duplicated.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the scope directory cannot be created.
    pub fn incoming_chunk_storage(&self, sender: &str) -> CoreResult<Arc<FsChunkStorage>> {
        let mut incoming = self.incoming.lock();
        if let Some(storage) = incoming.get(sender) {
            return Ok(Arc::clone(storage));
        }
        let storage = Arc::new(FsChunkStorage::open(&self.dir.peer_dir(sender))?);
        incoming.insert(sender.to_string(), Arc::clone(&storage));
        Ok(storage)
    }

    /// Enumerates remote senders with an incoming scope.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the scope registry cannot be read.
    pub fn senders(&self) -> CoreResult<Vec<String>> {
        self.dir.list_peers()
    }

    /// Builds a chunk cache over the local scope for `uri` within the
    /// inclusive era range `[from_era, to_era]`.
    ///
    /// # Errors
    ///
    /// Returns an I/O or corruption error if the storage cannot be read.
    pub fn chunk_cache(&self, uri: &str, from_era: Era, to_era: Era) -> CoreResult<ChunkCache> {
        let storage: Arc<dyn ChunkStorage> = self.local.clone();
        ChunkCache::new(storage, uri, from_era, to_era)
    }
}

//! # CourierDB Core
//!
//! Era-partitioned store-and-forward message storage engine.
//!
//! CourierDB keeps messages that cannot be delivered right away.
//! Applications append messages under an opaque uri; the engine groups them
//! into rotating time windows ("eras") so a synchronization layer can later
//! transmit exactly what a peer has not seen yet. Eras live in a circular
//! number space and are retired once no peer needs them anymore.
//!
//! This crate provides:
//! - Circular era arithmetic ([`Era`])
//! - Chunks: the messages and recipients of one uri within one era
//! - Scoped chunk storage, one scope for the local app and one per remote
//!   sender ([`ChunkStorage`], [`FsChunkStorage`], [`MemoryChunkStorage`])
//! - An era-agnostic ordered read view ([`ChunkCache`])
//! - Durable engine state with crash-safe saves ([`EngineState`],
//!   [`Memento`])
//! - The [`Engine`] composition root binding it all together
//!
//! Wire transmission, payload cryptography, and routing are deliberately
//! out of scope; they consume this crate through the storage scopes and
//! era enumeration.
//!
//! ## Example
//!
//! ```rust
//! use courierdb_core::{Engine, Era};
//!
//! # fn main() -> courierdb_core::CoreResult<()> {
//! let dir = tempfile::tempdir().unwrap();
//! let engine = Engine::open_with_owner(dir.path(), "alice")?;
//!
//! engine.add("inbox/msg", b"hello")?;
//! engine.new_era()?;
//! engine.add("inbox/msg", b"world")?;
//!
//! let cache = engine.chunk_cache("inbox/msg", Era::ZERO, engine.era())?;
//! assert_eq!(cache.size(), 2);
//! assert_eq!(cache.message_at(0, true)?, b"hello");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod chunk;
mod dir;
mod engine;
mod era;
mod error;
mod memento;
mod state;
mod storage;

pub use cache::ChunkCache;
pub use chunk::{Chunk, CHUNK_MAGIC, CHUNK_VERSION};
pub use dir::StoreDir;
pub use engine::Engine;
pub use era::{Era, EraRange};
pub use error::{CoreError, CoreResult};
pub use memento::Memento;
pub use state::{
    is_sentinel_owner, EngineState, ANONYMOUS_OWNER, ANY_FORMAT, DEFAULT_INIT_ERA, DEFAULT_OWNER,
};
pub use storage::{ChunkStorage, FsChunkStorage, MemoryChunkStorage, StorageMode};

//! Store root directory management.
//!
//! File system layout of one store root:
//!
//! ```text
//! <root>/
//! ├─ STATE                       # persisted engine state record
//! ├─ LOCK                        # advisory lock for single-process access
//! ├─ local/<era>/<uri>.chunk     # local outgoing scope
//! └─ peers/<peer>/<era>/<uri>.chunk   # one incoming scope per remote sender
//! ```
//!
//! Era directories are decimal era numbers. Uri and peer path components are
//! byte-escaped so arbitrary opaque identifiers map onto single file names.
//! The LOCK file ensures only one process drives a store root at a time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File and directory names within the store root.
const STATE_FILE: &str = "STATE";
const STATE_TEMP: &str = "STATE.tmp";
const LOCK_FILE: &str = "LOCK";
const LOCAL_DIR: &str = "local";
const PEERS_DIR: &str = "peers";

/// Manages the store root directory and its advisory lock.
///
/// Only one `StoreDir` instance can exist per root at a time; the lock is
/// released when the instance is dropped.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl StoreDir {
    /// Opens a store root, creating the directory tree if missing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreLocked`] if another process holds the lock,
    /// or an I/O error if the tree cannot be created.
    pub fn open(path: &Path) -> CoreResult<Self> {
        fs::create_dir_all(path)?;

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the store root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the persisted state record.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.path.join(STATE_FILE)
    }

    /// Returns the staging path for atomic state writes.
    #[must_use]
    pub fn state_temp_path(&self) -> PathBuf {
        self.path.join(STATE_TEMP)
    }

    /// Returns the directory of the local outgoing scope.
    #[must_use]
    pub fn local_dir(&self) -> PathBuf {
        self.path.join(LOCAL_DIR)
    }

    /// Returns the scope directory for one remote sender.
    #[must_use]
    pub fn peer_dir(&self, peer: &str) -> PathBuf {
        self.path.join(PEERS_DIR).join(escape_component(peer))
    }

    /// Enumerates remote senders with an incoming scope on disk.
    ///
    /// Scope directories are created when an incoming storage handle is
    /// first requested, so this lists every sender ever seen by this root.
    pub fn list_peers(&self) -> CoreResult<Vec<String>> {
        let peers_dir = self.path.join(PEERS_DIR);
        if !peers_dir.exists() {
            return Ok(Vec::new());
        }

        let mut peers = Vec::new();
        for entry in fs::read_dir(&peers_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            peers.push(unescape_component(name)?);
        }
        peers.sort();
        Ok(peers)
    }

    /// True when this root has no persisted state yet.
    #[must_use]
    pub fn is_new_store(&self) -> bool {
        !self.state_path().exists()
    }
}

/// Escapes an opaque identifier into a single path component.
///
/// Bytes outside `[A-Za-z0-9._-]` are written as `%XX`, so the mapping is
/// deterministic and reversible and identifiers like `inbox/msg` never
/// introduce path separators.
pub(crate) fn escape_component(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for &byte in raw.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                escaped.push(byte as char);
            }
            _ => {
                escaped.push('%');
                escaped.push_str(&format!("{byte:02X}"));
            }
        }
    }
    escaped
}

/// Reverses [`escape_component`].
pub(crate) fn unescape_component(escaped: &str) -> CoreResult<String> {
    let bytes = escaped.as_bytes();
    let mut raw = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|pair| std::str::from_utf8(pair).ok())
                .and_then(|pair| u8::from_str_radix(pair, 16).ok());
            let Some(byte) = hex else {
                return Err(CoreError::state_corrupted(format!(
                    "malformed escape in path component: {escaped}"
                )));
            };
            raw.push(byte);
            i += 3;
        } else {
            raw.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(raw)
        .map_err(|_| CoreError::state_corrupted(format!("non-UTF-8 path component: {escaped}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_root() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("store");

        let dir = StoreDir::open(&root).unwrap();
        assert!(root.is_dir());
        assert!(dir.is_new_store());
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("store");

        let _dir = StoreDir::open(&root).unwrap();
        let result = StoreDir::open(&root);
        assert!(matches!(result, Err(CoreError::StoreLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("store");

        {
            let _dir = StoreDir::open(&root).unwrap();
        }
        let _dir2 = StoreDir::open(&root).unwrap();
    }

    #[test]
    fn list_peers_empty_without_scopes() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path()).unwrap();
        assert!(dir.list_peers().unwrap().is_empty());
    }

    #[test]
    fn list_peers_unescapes_names() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path()).unwrap();

        fs::create_dir_all(dir.peer_dir("bob")).unwrap();
        fs::create_dir_all(dir.peer_dir("peer/with:odd chars")).unwrap();

        let peers = dir.list_peers().unwrap();
        assert_eq!(peers, vec!["bob".to_string(), "peer/with:odd chars".to_string()]);
    }

    #[test]
    fn escape_round_trip() {
        for raw in ["plain", "inbox/msg", "sn://all", "a b%c", "ünïcode"] {
            let escaped = escape_component(raw);
            assert!(!escaped.contains('/'));
            assert_eq!(unescape_component(&escaped).unwrap(), raw);
        }
    }

    #[test]
    fn escape_is_deterministic() {
        assert_eq!(escape_component("inbox/msg"), "inbox%2Fmsg");
    }
}

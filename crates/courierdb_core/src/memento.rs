//! Durable persistence of engine state.

use crate::error::CoreResult;
use crate::state::EngineState;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Saves and restores the engine state record.
///
/// The memento owns exactly one record file. Saves overwrite the record in
/// full through a temporary file and an atomic rename, so a crash mid-save
/// leaves either the previous record or the new one, never a torn mix.
#[derive(Debug)]
pub struct Memento {
    path: PathBuf,
    temp_path: PathBuf,
}

impl Memento {
    /// Creates a memento over the given record and staging paths.
    #[must_use]
    pub fn new(path: PathBuf, temp_path: PathBuf) -> Self {
        Self { path, temp_path }
    }

    /// Restores the persisted engine state.
    ///
    /// A missing or zero-length record is not an error: it means first run,
    /// and the state defaults are returned.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::StateCorrupted`] when a record exists
    /// but does not parse per the fixed layout, and I/O errors when the
    /// backing medium cannot be read. Corruption is never silently treated
    /// as a first run.
    pub fn restore(&self) -> CoreResult<EngineState> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no persisted state, using defaults");
            return Ok(EngineState::default());
        }

        let mut data = Vec::new();
        File::open(&self.path)?.read_to_end(&mut data)?;

        if data.is_empty() {
            // An empty record can only come from an interrupted first
            // create; treat it like a first run.
            return Ok(EngineState::default());
        }

        EngineState::decode(&data)
    }

    /// Persists the engine state, replacing any previous record in full.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the record cannot be written or renamed
    /// into place.
    pub fn save(&self, state: &EngineState) -> CoreResult<()> {
        let data = state.encode();

        let mut file = File::create(&self.temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        self.sync_parent_directory()?;

        Ok(())
    }

    /// Syncs the record's parent directory so the rename is durable.
    #[cfg(unix)]
    fn sync_parent_directory(&self) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent_directory(&self) -> CoreResult<()> {
        // NTFS journaling covers metadata durability; directory fsync is
        // not available in the same way as on Unix.
        Ok(())
    }

    /// Returns the record path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::era::Era;
    use crate::error::CoreError;
    use crate::state::{ANY_FORMAT, DEFAULT_INIT_ERA, DEFAULT_OWNER};
    use tempfile::tempdir;

    fn memento_in(temp: &tempfile::TempDir) -> Memento {
        Memento::new(
            temp.path().join("STATE"),
            temp.path().join("STATE.tmp"),
        )
    }

    #[test]
    fn restore_without_record_yields_defaults() {
        let temp = tempdir().unwrap();
        let state = memento_in(&temp).restore().unwrap();

        assert_eq!(state.owner(), DEFAULT_OWNER);
        assert_eq!(state.format(), ANY_FORMAT);
        assert_eq!(state.era(), DEFAULT_INIT_ERA);
        assert_eq!(state.oldest_era(), DEFAULT_INIT_ERA);
        assert_eq!(state.peers_seen().count(), 0);
    }

    #[test]
    fn save_restore_round_trip() {
        let temp = tempdir().unwrap();
        let memento = memento_in(&temp);

        let mut state = EngineState::default();
        state.attribute_owner("alice").unwrap();
        state.advance_era();
        state.advance_era();
        state.set_last_seen("bob", Era::new(1));

        memento.save(&state).unwrap();
        assert_eq!(memento.restore().unwrap(), state);
    }

    #[test]
    fn save_overwrites_previous_record() {
        let temp = tempdir().unwrap();
        let memento = memento_in(&temp);

        let mut state = EngineState::default();
        state.set_last_seen("bob", Era::new(1));
        state.set_last_seen("carol", Era::new(2));
        memento.save(&state).unwrap();

        // A shorter record must fully replace the longer one.
        let short = EngineState::default();
        memento.save(&short).unwrap();
        assert_eq!(memento.restore().unwrap(), short);
    }

    #[test]
    fn truncated_record_is_corruption_not_first_run() {
        let temp = tempdir().unwrap();
        let memento = memento_in(&temp);

        let mut state = EngineState::default();
        state.set_last_seen("bob", Era::new(7));
        memento.save(&state).unwrap();

        let data = fs::read(memento.path()).unwrap();
        fs::write(memento.path(), &data[..data.len() - 3]).unwrap();

        let result = memento.restore();
        assert!(matches!(result, Err(CoreError::StateCorrupted { .. })));
    }

    #[test]
    fn empty_record_counts_as_first_run() {
        let temp = tempdir().unwrap();
        let memento = memento_in(&temp);
        fs::write(memento.path(), b"").unwrap();

        let state = memento.restore().unwrap();
        assert_eq!(state.owner(), DEFAULT_OWNER);
    }
}

//! Engine state: owner identity, format tag, era counters, last-seen map.

use crate::chunk::Reader;
use crate::era::Era;
use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;

/// Sentinel owner for state that was never attributed to anyone.
pub const DEFAULT_OWNER: &str = "default_owner";

/// Sentinel owner for deliberately anonymous state.
pub const ANONYMOUS_OWNER: &str = "anon";

/// Format tag accepted by every protocol version.
pub const ANY_FORMAT: &str = "any";

/// Era assigned to a store on first run.
pub const DEFAULT_INIT_ERA: Era = Era::ZERO;

/// The durable state of one engine.
///
/// All era counters and the per-peer synchronization map live here behind a
/// single write path: the engine mutates a state value under its write lock
/// and persists it through [`crate::memento::Memento`]. Nothing else touches
/// these fields.
///
/// Invariant: `oldest_era` precedes or equals `era` along the circular
/// sequence starting at `oldest_era`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    owner: String,
    format: String,
    era: Era,
    oldest_era: Era,
    last_seen: BTreeMap<String, Era>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            format: ANY_FORMAT.to_string(),
            era: DEFAULT_INIT_ERA,
            oldest_era: DEFAULT_INIT_ERA,
            last_seen: BTreeMap::new(),
        }
    }
}

impl EngineState {
    /// Returns the recorded owner identity.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the protocol format tag. Opaque to the core.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Sets the protocol format tag.
    pub fn set_format(&mut self, format: impl Into<String>) {
        self.format = format.into();
    }

    /// Returns the current writable era.
    #[must_use]
    pub fn era(&self) -> Era {
        self.era
    }

    /// Returns the oldest era still retained.
    #[must_use]
    pub fn oldest_era(&self) -> Era {
        self.oldest_era
    }

    /// True once a concrete (non-sentinel) owner was recorded.
    #[must_use]
    pub fn is_attributed(&self) -> bool {
        !is_sentinel_owner(&self.owner)
    }

    /// Applies the ownership assignment rule.
    ///
    /// An unattributed state (sentinel owner) accepts any concrete owner.
    /// An attributed state accepts only the same owner again or a sentinel,
    /// both as no-ops. Returns true when the state changed and therefore
    /// must be persisted by the caller.
    ///
    /// Owner comparison is ASCII case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OwnershipConflict`] when a different concrete
    /// owner was supplied for an attributed state. The state is untouched
    /// in that case.
    pub fn attribute_owner(&mut self, owner: &str) -> CoreResult<bool> {
        if is_sentinel_owner(owner) {
            return Ok(false);
        }
        if self.is_attributed() {
            if self.owner.eq_ignore_ascii_case(owner) {
                return Ok(false);
            }
            return Err(CoreError::OwnershipConflict {
                current: self.owner.clone(),
                requested: owner.to_string(),
            });
        }
        self.owner = owner.to_string();
        Ok(true)
    }

    /// Closes the current era and opens the next one.
    ///
    /// Returns the era that was closed.
    pub fn advance_era(&mut self) -> Era {
        let closed = self.era;
        self.era = self.era.next();
        closed
    }

    /// Advances the retention boundary by one era.
    ///
    /// Returns the retired era, or `None` when `oldest_era` has caught up
    /// with `era` and must not advance past it.
    pub fn advance_oldest_era(&mut self) -> Option<Era> {
        if self.oldest_era == self.era {
            return None;
        }
        let retired = self.oldest_era;
        self.oldest_era = self.oldest_era.next();
        Some(retired)
    }

    /// Returns the last era synchronized with `peer`, if any.
    #[must_use]
    pub fn last_seen(&self, peer: &str) -> Option<Era> {
        self.last_seen.get(peer).copied()
    }

    /// Records the last era synchronized with `peer`.
    pub fn set_last_seen(&mut self, peer: impl Into<String>, era: Era) {
        self.last_seen.insert(peer.into(), era);
    }

    /// Iterates all peers with a recorded synchronization era.
    pub fn peers_seen(&self) -> impl Iterator<Item = (&str, Era)> {
        self.last_seen.iter().map(|(peer, &era)| (peer.as_str(), era))
    }

    /// Encodes the state record.
    ///
    /// Layout: owner and format as length-prefixed UTF-8, the two era
    /// counters as 32-bit integers, then an explicit pair count followed by
    /// `(peer, era)` pairs. The explicit count lets a reader distinguish a
    /// clean end-of-list from a truncated record.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        encode_string(&mut buf, &self.owner);
        encode_string(&mut buf, &self.format);
        buf.extend_from_slice(&self.era.as_u32().to_le_bytes());
        buf.extend_from_slice(&self.oldest_era.as_u32().to_le_bytes());

        let count = u32::try_from(self.last_seen.len()).unwrap_or(u32::MAX);
        buf.extend_from_slice(&count.to_le_bytes());
        for (peer, &era) in self.last_seen.iter().take(count as usize) {
            encode_string(&mut buf, peer);
            buf.extend_from_slice(&era.as_u32().to_le_bytes());
        }

        buf
    }

    /// Decodes a state record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StateCorrupted`] on truncation, invalid UTF-8,
    /// an out-of-range era value, or trailing bytes after the declared pair
    /// list.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut reader = Reader::for_state(data);

        let owner = reader.string("owner")?;
        let format = reader.string("format")?;
        let era = decode_era(&mut reader, "era")?;
        let oldest_era = decode_era(&mut reader, "oldest era")?;

        let count = reader.u32("peer count")?;
        let mut last_seen = BTreeMap::new();
        for _ in 0..count {
            let peer = reader.string("peer")?;
            let seen = decode_era(&mut reader, "peer era")?;
            last_seen.insert(peer, seen);
        }

        reader.expect_exhausted()?;

        Ok(Self {
            owner,
            format,
            era,
            oldest_era,
            last_seen,
        })
    }
}

/// True for the owner values denoting unattributed state.
#[must_use]
pub fn is_sentinel_owner(owner: &str) -> bool {
    owner.eq_ignore_ascii_case(DEFAULT_OWNER) || owner.eq_ignore_ascii_case(ANONYMOUS_OWNER)
}

fn encode_string(buf: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&bytes[..len as usize]);
}

fn decode_era(reader: &mut Reader<'_>, what: &str) -> CoreResult<Era> {
    let raw = reader.u32(what)?;
    if raw > Era::MAX.as_u32() {
        return Err(CoreError::state_corrupted(format!(
            "{what} value {raw} outside era space"
        )));
    }
    Ok(Era::new(raw))
}

//! The chunk: one uri, one era, messages and recipients.

use crate::era::Era;
use crate::error::{CoreError, CoreResult};
use std::collections::BTreeSet;

/// Magic bytes for a serialized chunk.
pub const CHUNK_MAGIC: [u8; 4] = *b"CDCK";

/// Current chunk serialization version.
pub const CHUNK_VERSION: u16 = 1;

/// The atomic addressable unit of the store.
///
/// A chunk holds every message appended under one uri during one era, in
/// append order, plus the recipient set for that uri. Message payloads are
/// opaque bytes; the core never interprets them.
///
/// Recipients belong to the uri's addressable stream rather than to a single
/// era. They are carried on the chunk that represents the current writable
/// era for that uri, and callers mutate them only on that live chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    uri: String,
    era: Era,
    messages: Vec<Vec<u8>>,
    recipients: BTreeSet<String>,
}

impl Chunk {
    /// Creates an empty chunk for the given uri and era.
    #[must_use]
    pub fn new(uri: impl Into<String>, era: Era) -> Self {
        Self {
            uri: uri.into(),
            era,
            messages: Vec::new(),
            recipients: BTreeSet::new(),
        }
    }

    /// Returns the uri this chunk belongs to.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the era this chunk was produced in.
    #[must_use]
    pub fn era(&self) -> Era {
        self.era
    }

    /// Returns all message payloads in append order.
    #[must_use]
    pub fn messages(&self) -> &[Vec<u8>] {
        &self.messages
    }

    /// Returns the number of messages in this chunk.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Appends a message payload.
    pub fn add_message(&mut self, payload: impl Into<Vec<u8>>) {
        self.messages.push(payload.into());
    }

    /// Returns the recipient set.
    #[must_use]
    pub fn recipients(&self) -> &BTreeSet<String> {
        &self.recipients
    }

    /// Adds a recipient. Returns false if it was already present.
    pub fn add_recipient(&mut self, recipient: impl Into<String>) -> bool {
        self.recipients.insert(recipient.into())
    }

    /// Removes a recipient if present. Returns false otherwise.
    pub fn remove_recipient(&mut self, recipient: &str) -> bool {
        self.recipients.remove(recipient)
    }

    /// Replaces the entire recipient set.
    pub fn set_recipients<I, S>(&mut self, recipients: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients = recipients.into_iter().map(Into::into).collect();
    }

    /// True when the chunk carries neither messages nor recipients.
    ///
    /// An empty chunk is never persisted: a chunk exists on the backing
    /// medium iff a message was appended or recipients were set for it.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.recipients.is_empty()
    }

    /// Encodes the chunk to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&CHUNK_MAGIC);
        buf.extend_from_slice(&CHUNK_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.era.as_u32().to_le_bytes());

        let uri_bytes = self.uri.as_bytes();
        let uri_len = u16::try_from(uri_bytes.len()).unwrap_or(u16::MAX);
        buf.extend_from_slice(&uri_len.to_le_bytes());
        buf.extend_from_slice(&uri_bytes[..uri_len as usize]);

        let recipient_count = u16::try_from(self.recipients.len()).unwrap_or(u16::MAX);
        buf.extend_from_slice(&recipient_count.to_le_bytes());
        for recipient in self.recipients.iter().take(recipient_count as usize) {
            let bytes = recipient.as_bytes();
            let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(&bytes[..len as usize]);
        }

        let message_count = u32::try_from(self.messages.len()).unwrap_or(u32::MAX);
        buf.extend_from_slice(&message_count.to_le_bytes());
        for message in self.messages.iter().take(message_count as usize) {
            let len = u32::try_from(message.len()).unwrap_or(u32::MAX);
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(&message[..len as usize]);
        }

        buf
    }

    /// Decodes a chunk from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChunkCorrupted`] if the data does not follow the
    /// fixed layout exactly, including trailing garbage.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut reader = Reader::new(data);

        let magic = reader.bytes(4, "magic")?;
        if magic != CHUNK_MAGIC {
            return Err(CoreError::chunk_corrupted("bad chunk magic"));
        }

        let version = reader.u16("version")?;
        if version > CHUNK_VERSION {
            return Err(CoreError::chunk_corrupted(format!(
                "unsupported chunk version: {version}"
            )));
        }

        let era = Era::new(reader.u32("era")?);

        let uri = reader.string("uri")?;

        let recipient_count = reader.u16("recipient count")?;
        let mut recipients = BTreeSet::new();
        for _ in 0..recipient_count {
            recipients.insert(reader.string("recipient")?);
        }

        let message_count = reader.u32("message count")?;
        let mut messages = Vec::new();
        for _ in 0..message_count {
            let len = reader.u32("message length")? as usize;
            messages.push(reader.bytes(len, "message")?.to_vec());
        }

        reader.expect_exhausted()?;

        Ok(Self {
            uri,
            era,
            messages,
            recipients,
        })
    }
}

/// Bounds-checked cursor over a serialized record.
///
/// Shared by the chunk codec and the engine state codec so both fail with
/// precise corruption messages instead of panicking on short input.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
    corrupt: fn(String) -> CoreError,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            cursor: 0,
            corrupt: |message| CoreError::ChunkCorrupted { message },
        }
    }

    pub(crate) fn for_state(data: &'a [u8]) -> Self {
        Self {
            data,
            cursor: 0,
            corrupt: |message| CoreError::StateCorrupted { message },
        }
    }

    pub(crate) fn bytes(&mut self, len: usize, what: &str) -> CoreResult<&'a [u8]> {
        let end = self.cursor.checked_add(len).filter(|&end| end <= self.data.len());
        let Some(end) = end else {
            return Err((self.corrupt)(format!("record truncated reading {what}")));
        };
        let slice = &self.data[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    pub(crate) fn u16(&mut self, what: &str) -> CoreResult<u16> {
        let bytes = self.bytes(2, what)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn u32(&mut self, what: &str) -> CoreResult<u32> {
        let bytes = self.bytes(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn string(&mut self, what: &str) -> CoreResult<String> {
        let len = self.u16(what)? as usize;
        let bytes = self.bytes(len, what)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| (self.corrupt)(format!("invalid UTF-8 in {what}")))
    }

    pub(crate) fn expect_exhausted(&self) -> CoreResult<()> {
        if self.cursor == self.data.len() {
            Ok(())
        } else {
            Err((self.corrupt)(format!(
                "{} trailing bytes after record",
                self.data.len() - self.cursor
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_is_empty() {
        let chunk = Chunk::new("inbox/msg", Era::ZERO);
        assert!(chunk.is_empty());
        assert_eq!(chunk.message_count(), 0);
        assert_eq!(chunk.uri(), "inbox/msg");
    }

    #[test]
    fn messages_keep_append_order() {
        let mut chunk = Chunk::new("u", Era::new(3));
        chunk.add_message(b"first".to_vec());
        chunk.add_message(b"second".to_vec());

        assert_eq!(chunk.messages()[0], b"first");
        assert_eq!(chunk.messages()[1], b"second");
    }

    #[test]
    fn recipient_add_remove_round_trip() {
        let mut chunk = Chunk::new("u", Era::ZERO);

        assert!(chunk.add_recipient("alice"));
        assert!(!chunk.add_recipient("alice"));
        assert!(chunk.remove_recipient("alice"));
        assert!(!chunk.remove_recipient("alice"));
        assert!(chunk.recipients().is_empty());
    }

    #[test]
    fn set_recipients_replaces() {
        let mut chunk = Chunk::new("u", Era::ZERO);
        chunk.set_recipients(["a", "b"]);
        chunk.set_recipients(["c"]);

        assert_eq!(chunk.recipients().len(), 1);
        assert!(chunk.recipients().contains("c"));
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut chunk = Chunk::new("inbox/msg", Era::new(17));
        chunk.add_message(b"hello".to_vec());
        chunk.add_message(b"world".to_vec());
        chunk.set_recipients(["alice", "bob"]);

        let decoded = Chunk::decode(&chunk.encode()).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn decode_empty_payloads() {
        let mut chunk = Chunk::new("u", Era::ZERO);
        chunk.add_message(Vec::new());

        let decoded = Chunk::decode(&chunk.encode()).unwrap();
        assert_eq!(decoded.message_count(), 1);
        assert!(decoded.messages()[0].is_empty());
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let result = Chunk::decode(b"XXXX\x01\x00");
        assert!(matches!(result, Err(CoreError::ChunkCorrupted { .. })));
    }

    #[test]
    fn decode_rejects_truncation() {
        let mut data = Chunk::new("u", Era::ZERO).encode();
        data.truncate(data.len() - 1);

        let result = Chunk::decode(&data);
        assert!(matches!(result, Err(CoreError::ChunkCorrupted { .. })));
    }

    #[test]
    fn decode_rejects_trailing_garbage() {
        let mut data = Chunk::new("u", Era::ZERO).encode();
        data.push(0xFF);

        let result = Chunk::decode(&data);
        assert!(matches!(result, Err(CoreError::ChunkCorrupted { .. })));
    }
}

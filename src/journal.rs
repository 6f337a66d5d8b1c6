//! An ordered, replayable log of [`Command`]s with a small type/version
//! header used to detect a document opened against the wrong schema.

use std::io::Read;

use crate::command::{self, Command};
use crate::error::{DocumentError, Result};
use crate::stream::MemoryMappedStream;
use crate::value::Value;

/// In-memory mirror of everything written to a document's journal stream
/// since the last snapshot.
pub struct Journal {
    type_tag: String,
    version: u32,
    commands: Vec<Command>,
}

impl Journal {
    /// A fresh, empty journal for the given schema.
    pub fn new(type_tag: impl Into<String>, version: u32) -> Self {
        Journal {
            type_tag: type_tag.into(),
            version,
            commands: Vec::new(),
        }
    }

    /// Commands logged since the last `clear()`.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of logged commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether any commands have been logged since the last `clear()`.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Record a command that has already been durably written to the
    /// stream.
    pub fn add(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Drop all logged commands, keeping the schema header. Called after a
    /// snapshot makes the logged commands redundant.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// The fixed-size header written at the start of every journal stream:
    /// a length-prefixed type tag followed by a big-endian version.
    pub fn serialize_header(&self) -> Vec<u8> {
        let tag_bytes = self.type_tag.as_bytes();
        let mut buf = Vec::with_capacity(4 + tag_bytes.len() + 4);
        buf.extend_from_slice(&(tag_bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(tag_bytes);
        buf.extend_from_slice(&self.version.to_be_bytes());
        buf
    }

    /// Write the header followed by every logged command to `stream`.
    pub fn serialize(&self, stream: &mut MemoryMappedStream) -> Result<()> {
        stream.write(&self.serialize_header())?;
        for command in &self.commands {
            command.serialize(stream)?;
        }
        Ok(())
    }

    /// Read a journal back from `reader`: the header must match
    /// `(expected_tag, expected_version)` exactly, or `SchemaMismatch` is
    /// returned. Commands are read until EOF or the stream's sentinel tail.
    pub fn deserialize<R: Read>(mut reader: R, expected_tag: &str, expected_version: u32) -> Result<Journal> {
        let mut tag_len_buf = [0u8; 4];
        reader
            .read_exact(&mut tag_len_buf)
            .map_err(|_| DocumentError::CorruptJournal("missing journal header".into()))?;
        let tag_len = u32::from_be_bytes(tag_len_buf) as usize;

        let mut tag_buf = vec![0u8; tag_len];
        reader
            .read_exact(&mut tag_buf)
            .map_err(|_| DocumentError::CorruptJournal("journal header tag truncated".into()))?;
        let found_tag = String::from_utf8(tag_buf)
            .map_err(|_| DocumentError::CorruptJournal("journal header tag is not valid UTF-8".into()))?;

        let mut version_buf = [0u8; 4];
        reader
            .read_exact(&mut version_buf)
            .map_err(|_| DocumentError::CorruptJournal("journal header version truncated".into()))?;
        let found_version = u32::from_be_bytes(version_buf);

        if found_tag != expected_tag || found_version != expected_version {
            return Err(DocumentError::SchemaMismatch {
                expected_tag: expected_tag.to_string(),
                expected_version,
                found_tag,
                found_version,
            });
        }

        let commands = command::read_commands(reader, crate::stream::SENTINEL_BYTE)?;
        Ok(Journal {
            type_tag: expected_tag.to_string(),
            version: expected_version,
            commands,
        })
    }

    /// Replay every logged command against `doc`, in order. Stops and
    /// returns the first error; `doc` may be left partially mutated in
    /// that case, so callers that need a clean rollback should replay
    /// against a fresh clone.
    pub fn apply_to(&self, doc: &mut Value) -> Result<()> {
        for command in &self.commands {
            command.apply(doc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::SENTINEL_BYTE;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn round_trips_header_and_commands() {
        let dir = tempdir().unwrap();
        let mut stream = MemoryMappedStream::open(dir.path().join("j"), 256, SENTINEL_BYTE).unwrap();

        let mut journal = Journal::new("widget", 3);
        journal.add(Command::new("name", Some(Value::String("a".into()))));
        journal.add(Command::new("count", Some(Value::Int(1))));
        journal.serialize(&mut stream).unwrap();

        let cursor = Cursor::new(stream.as_slice().to_vec());
        let read_back = Journal::deserialize(cursor, "widget", 3).unwrap();
        assert_eq!(read_back.len(), 2);
    }

    #[test]
    fn schema_mismatch_is_reported_distinctly() {
        let dir = tempdir().unwrap();
        let mut stream = MemoryMappedStream::open(dir.path().join("j"), 256, SENTINEL_BYTE).unwrap();
        Journal::new("widget", 3).serialize(&mut stream).unwrap();

        let cursor = Cursor::new(stream.as_slice().to_vec());
        let err = Journal::deserialize(cursor, "widget", 4).unwrap_err();
        assert!(matches!(err, DocumentError::SchemaMismatch { .. }));
    }

    #[test]
    fn apply_to_replays_in_order() {
        let mut journal = Journal::new("widget", 1);
        journal.add(Command::new("n", Some(Value::Int(1))));
        journal.add(Command::new("n+", Some(Value::Int(2))));

        let mut doc = Value::empty_map();
        journal.apply_to(&mut doc).unwrap();
        assert_eq!(doc.as_map().unwrap().get("n"), Some(&Value::Int(3)));
    }

    #[test]
    fn clear_drops_commands_but_keeps_schema() {
        let mut journal = Journal::new("widget", 1);
        journal.add(Command::new("n", Some(Value::Int(1))));
        journal.clear();
        assert!(journal.is_empty());
        assert_eq!(journal.type_tag, "widget");
    }
}

//! A single logged mutation: a path string paired with an optional value.

use std::io::{self, Read};

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, Result};
use crate::path;
use crate::stream::MemoryMappedStream;
use crate::value::Value;

/// The wire representation of a command's payload. A plain `Option<Value>`
/// can't be used here: serde's blanket `Option<T>` impl serializes both
/// `None` and `Some(Value::Null)` as the JSON literal `null`, which would
/// make "delete this path" indistinguishable from "set this path to
/// `null`" once read back from the journal. Tagging the two cases
/// explicitly keeps them apart on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Slot {
    Delete,
    Value(Value),
}

impl From<Option<Value>> for Slot {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(v) => Slot::Value(v),
            None => Slot::Delete,
        }
    }
}

impl From<Slot> for Option<Value> {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Value(v) => Some(v),
            Slot::Delete => None,
        }
    }
}

/// A logged mutation. `value = None` deletes whatever the path resolves to;
/// `value = Some(Value::Null)` stores a legitimate JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    path: String,
    slot: Slot,
}

impl Command {
    /// Build a command. Does not validate the path; that happens on `apply`.
    pub fn new(path: impl Into<String>, value: Option<Value>) -> Self {
        Command {
            path: path.into(),
            slot: value.into(),
        }
    }

    /// The raw path string this command was built with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The value this command carries, if any.
    pub fn value(&self) -> Option<&Value> {
        match &self.slot {
            Slot::Value(v) => Some(v),
            Slot::Delete => None,
        }
    }

    /// Parse the path and apply the mutation to `doc` in place.
    pub fn apply(&self, doc: &mut Value) -> Result<()> {
        let directives = path::parse(&self.path)?;
        path::apply(doc, &directives, self.slot.clone().into())
    }

    /// Encode this command as a self-delimiting frame and append it to
    /// `stream`. The frame is a big-endian `u32` JSON byte length followed
    /// by the JSON payload itself; because valid JSON text never contains
    /// the byte `0x99`, the frame can never be mistaken for the stream's
    /// sentinel-filled tail.
    pub fn serialize(&self, stream: &mut MemoryMappedStream) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        let mut frame = Vec::with_capacity(4 + json.len());
        frame.extend_from_slice(&(json.len() as u32).to_be_bytes());
        frame.extend_from_slice(&json);
        stream.write(&frame)
    }
}

/// Read consecutive command frames from `reader` until either EOF or a
/// frame header whose leading byte is `sentinel` (the mark of unwritten,
/// fill-byte stream tail).
pub fn read_commands<R: Read>(mut reader: R, sentinel: u8) -> Result<Vec<Command>> {
    let mut commands = Vec::new();
    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        if len_buf[0] == sentinel {
            break;
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                DocumentError::CorruptJournal("command frame truncated before its declared length".into())
            } else {
                DocumentError::from(e)
            }
        })?;

        let cmd: Command = serde_json::from_slice(&payload)
            .map_err(|e| DocumentError::CorruptJournal(format!("malformed command frame: {}", e)))?;
        commands.push(cmd);
    }
    Ok(commands)
}

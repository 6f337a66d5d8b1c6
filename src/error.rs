use failure::Fail;
use std::io;

/// Error type. It represents the ways a journaled document could be invalid.
#[derive(Fail, Debug)]
pub enum DocumentError {
    /// An IO error. Wraps a `std::io::Error`.
    #[fail(display = "{}", _0)]
    Io(#[fail(cause)] io::Error),

    /// Serialization or deserialization error.
    #[fail(display = "{}", _0)]
    Serde(#[fail(cause)] serde_json::Error),

    /// A path string could not be parsed into directives.
    #[fail(display = "invalid path {:?}: {}", path, reason)]
    InvalidPath {
        /// The offending path string.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A command frame would not fit in the remaining capacity of the
    /// memory-mapped stream.
    #[fail(display = "stream buffer overflow")]
    BufferOverflow,

    /// A mutation was attempted on a document that has already been closed.
    #[fail(display = "document is closed")]
    Closed,

    /// The journal file is corrupt, truncated, or otherwise unreadable.
    #[fail(display = "corrupt journal: {}", _0)]
    CorruptJournal(String),

    /// The snapshot file is corrupt or otherwise unreadable.
    #[fail(display = "corrupt snapshot: {}", _0)]
    CorruptSnapshot(String),

    /// The journal header's `(type_tag, version)` does not match what the
    /// caller configured the document with.
    #[fail(
        display = "journal schema mismatch: expected ({}, {}), found ({}, {})",
        expected_tag,
        expected_version,
        found_tag,
        found_version
    )]
    SchemaMismatch {
        /// Type tag the document was constructed with.
        expected_tag: String,
        /// Version the document was constructed with.
        expected_version: u32,
        /// Type tag actually found in the journal header.
        found_tag: String,
        /// Version actually found in the journal header.
        found_version: u32,
    },

    /// An unrecoverable failure: a second buffer overflow after the single
    /// permitted retry, a failed snapshot rename, or an un-serializable
    /// value reaching the snapshot writer. The caller cannot sensibly
    /// recover from this locally.
    #[fail(display = "fatal: {}", _0)]
    Fatal(String),
}

impl From<io::Error> for DocumentError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serde(error)
    }
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, DocumentError>;

//! The public document handle: orchestrates the in-memory value, the
//! journal, and the memory-mapped stream behind a crash-resilient
//! open/mutate/snapshot/close lifecycle.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use crate::command::Command;
use crate::error::{DocumentError, Result};
use crate::journal::Journal;
use crate::path;
use crate::recovery;
use crate::snapshot;
use crate::stream::{MemoryMappedStream, SENTINEL_BYTE};
use crate::value::Value;

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut os = base.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Derive `P.snapshot` from a document's base path.
pub fn snapshot_path_for(base: &Path) -> PathBuf {
    with_suffix(base, ".snapshot")
}

/// Derive `P.snapshot.new` from a document's base path.
pub fn snapshot_new_path_for(base: &Path) -> PathBuf {
    with_suffix(base, ".snapshot.new")
}

/// Derive `P.journal` from a document's base path.
pub fn journal_path_for(base: &Path) -> PathBuf {
    with_suffix(base, ".journal")
}

/// Everything needed to construct or recover a [`JournaledDocument`].
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// The base path `P`; `.snapshot`, `.snapshot.new`, and `.journal` are
    /// derived from it.
    pub base_path: PathBuf,
    /// Opaque schema identifier written into the journal header and
    /// checked on recovery.
    pub type_tag: String,
    /// Schema version written into the journal header and checked on
    /// recovery.
    pub version: u32,
    /// Fixed capacity, in bytes, of the memory-mapped journal stream.
    pub capacity: usize,
    /// Journal byte usage at or above which `snapshot_if_high_water`
    /// triggers a snapshot.
    pub high_water: usize,
}

impl DocumentConfig {
    /// Build a config from its fields.
    pub fn new(
        base_path: impl Into<PathBuf>,
        type_tag: impl Into<String>,
        version: u32,
        capacity: usize,
        high_water: usize,
    ) -> Self {
        DocumentConfig {
            base_path: base_path.into(),
            type_tag: type_tag.into(),
            version,
            capacity,
            high_water,
        }
    }

    /// `P.snapshot`.
    pub fn snapshot_path(&self) -> PathBuf {
        snapshot_path_for(&self.base_path)
    }

    /// `P.snapshot.new`.
    pub fn snapshot_new_path(&self) -> PathBuf {
        snapshot_new_path_for(&self.base_path)
    }

    /// `P.journal`.
    pub fn journal_path(&self) -> PathBuf {
        journal_path_for(&self.base_path)
    }
}

struct Inner {
    stream: MemoryMappedStream,
    journal: Journal,
}

/// A crash-resilient, concurrently-readable document.
///
/// Reads (`get`, `size`, `contents`) take a brief shared lock on the
/// in-memory value and never touch the journal or stream. Mutations
/// (`add_command`, `snapshot`, `close`) are serialized through a single
/// mutation lock, matching the document's requirement that at most one
/// mutation be in flight at a time.
pub struct JournaledDocument {
    config: DocumentConfig,
    document: RwLock<Value>,
    inner: Mutex<Inner>,
    closed: AtomicBool,
    /// Mirrors `inner.stream.position()` so `snapshot_if_high_water` can
    /// make its first, uncontended check without taking the mutation lock.
    stream_position: AtomicUsize,
}

impl JournaledDocument {
    /// Construct a document directly from `initial_document`, immediately
    /// snapshotting it. `initial_document` must be a map, since every
    /// document root is a map.
    pub fn new(config: DocumentConfig, initial_document: Value) -> Result<Self> {
        if !matches!(initial_document, Value::Map(_)) {
            return Err(DocumentError::InvalidPath {
                path: String::new(),
                reason: "document root must be a map".into(),
            });
        }

        let stream = MemoryMappedStream::open(config.journal_path(), config.capacity, SENTINEL_BYTE)?;
        let journal = Journal::new(config.type_tag.clone(), config.version);

        let doc = JournaledDocument {
            config,
            document: RwLock::new(initial_document),
            inner: Mutex::new(Inner { stream, journal }),
            closed: AtomicBool::new(false),
            stream_position: AtomicUsize::new(0),
        };
        doc.snapshot()?;
        Ok(doc)
    }

    /// Convenience constructor: recover the initial map from whatever is
    /// on disk at `config.base_path` (or start from an empty map if
    /// nothing exists yet), then construct as with `new`.
    pub fn open(config: DocumentConfig) -> Result<Self> {
        let initial = if document_exists(&config.base_path) {
            recovery::load(&config)?
        } else {
            Value::empty_map()
        };
        Self::new(config, initial)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Append a command to the journal, applying it to the in-memory
    /// document only after it has been durably written to the stream. If
    /// the stream is full, a snapshot is forced to reclaim space and the
    /// write is retried exactly once; a second overflow is fatal.
    pub fn add_command(&self, path: impl Into<String>, value: Option<Value>) -> Result<()> {
        if self.is_closed() {
            return Err(DocumentError::Closed);
        }
        let command = Command::new(path.into(), value);

        let mut inner = self.inner.lock().expect("mutation lock poisoned");
        if self.is_closed() {
            return Err(DocumentError::Closed);
        }

        match command.serialize(&mut inner.stream) {
            Ok(()) => {}
            Err(DocumentError::BufferOverflow) => {
                warn!("journal stream full, forcing a snapshot to reclaim space");
                self.snapshot_locked(&mut inner)?;
                match command.serialize(&mut inner.stream) {
                    Ok(()) => {}
                    Err(DocumentError::BufferOverflow) => {
                        return Err(DocumentError::Fatal(
                            "command still overflows the journal stream immediately after a snapshot".into(),
                        ));
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }

        {
            let mut doc = self.document.write().expect("document lock poisoned");
            command.apply(&mut doc)?;
        }
        inner.journal.add(command);
        self.stream_position.store(inner.stream.position(), Ordering::Relaxed);
        Ok(())
    }

    /// Resolve `path` against the current document without mutating it.
    /// An empty path returns the whole document.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let directives = path::parse(path)?;
        let doc = self.document.read().expect("document lock poisoned");
        if directives.is_empty() {
            return Ok(Some(doc.clone()));
        }
        Ok(path::get(&doc, &directives).cloned())
    }

    /// Number of top-level keys in the document.
    pub fn size(&self) -> usize {
        let doc = self.document.read().expect("document lock poisoned");
        doc.as_map().map(|m| m.len()).unwrap_or(0)
    }

    /// A point-in-time, independently owned copy of the whole document,
    /// suitable for iteration without holding any lock.
    pub fn contents(&self) -> Value {
        self.document.read().expect("document lock poisoned").clone()
    }

    /// Write a fresh snapshot of the current document, then clear the
    /// journal and stream, since every logged command is now redundant.
    pub fn snapshot(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("mutation lock poisoned");
        self.snapshot_locked(&mut inner)
    }

    fn snapshot_locked(&self, inner: &mut Inner) -> Result<()> {
        let doc_copy = self.document.read().expect("document lock poisoned").clone();

        let new_path = self.config.snapshot_new_path();
        snapshot::write_snapshot(&new_path, &doc_copy).map_err(|e| match e {
            DocumentError::Serde(cause) => {
                DocumentError::Fatal(format!("document contains an un-serializable value: {}", cause))
            }
            other => other,
        })?;

        inner.journal.clear();
        inner.stream.clear()?;
        let header = inner.journal.serialize_header();
        inner.stream.write(&header)?;

        std::fs::rename(&new_path, self.config.snapshot_path())
            .map_err(|e| DocumentError::Fatal(format!("snapshot rename failed: {}", e)))?;

        self.stream_position.store(inner.stream.position(), Ordering::Relaxed);
        info!("snapshot written, journal reset ({} byte header)", header.len());
        Ok(())
    }

    /// Snapshot only if the journal stream has reached `config.high_water`
    /// bytes used. Double-checked: the first check is a lock-free read of
    /// the last-known stream position, so callers that poll this after
    /// every mutation don't contend on the mutation lock in the common
    /// case where the document is nowhere near its high-water mark; the
    /// second check, taken under the lock, guards against another thread
    /// having already snapshotted between the two checks.
    pub fn snapshot_if_high_water(&self) -> Result<()> {
        if self.stream_position.load(Ordering::Relaxed) < self.config.high_water {
            return Ok(());
        }
        let mut inner = self.inner.lock().expect("mutation lock poisoned");
        if inner.stream.position() >= self.config.high_water {
            self.snapshot_locked(&mut inner)?;
        }
        Ok(())
    }

    /// Flush a final snapshot and mark the document closed. Further calls
    /// to `add_command` return `DocumentError::Closed`. Idempotent: a
    /// second `close()` is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut inner = self.inner.lock().expect("mutation lock poisoned");
        self.snapshot_locked(&mut inner)
    }
}

impl Drop for JournaledDocument {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!(
                "JournaledDocument at {:?} dropped without close(); flushing a best-effort final snapshot",
                self.config.base_path
            );
            if let Err(e) = self.close() {
                warn!("best-effort snapshot on drop failed: {}", e);
            }
        }
    }
}

/// Whether a document exists at `base_path`: either its snapshot or its
/// transient `snapshot.new` is present.
pub fn document_exists(base_path: &Path) -> bool {
    snapshot_path_for(base_path).exists() || snapshot_new_path_for(base_path).exists()
}

/// Recover and return the document contents at `config.base_path` without
/// constructing a `JournaledDocument`.
pub fn load_document_contents(config: &DocumentConfig) -> Result<Value> {
    recovery::load(config)
}

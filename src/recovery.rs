//! Reconstructs a document's contents from whatever snapshot and journal
//! artifacts survived a crash, in the order that best favors durability
//! over recency.

use std::fs::File;
use std::io::BufReader;

use crate::document::DocumentConfig;
use crate::error::{DocumentError, Result};
use crate::journal::Journal;
use crate::snapshot;
use crate::value::Value;

/// Recover the document described by `config`:
///
/// 1. If `P.snapshot.new` exists and deserializes cleanly, a prior
///    snapshot crashed after writing it but before the rename to
///    `P.snapshot` — return it directly, since it is strictly newer.
/// 2. Otherwise deserialize `P.snapshot`. Failure here is fatal: there is
///    no valid state to recover.
/// 3. If `P.journal` exists, matches the configured schema, and replays
///    cleanly on top of the snapshot, return the replayed result.
///    Any failure at this step (missing file, schema mismatch, corrupt
///    frame, a command that fails to apply) is non-fatal: fall back to
///    the unmodified snapshot.
pub fn load(config: &DocumentConfig) -> Result<Value> {
    let snapshot_new_path = config.snapshot_new_path();
    if snapshot_new_path.exists() {
        match snapshot::read_snapshot(&snapshot_new_path) {
            Ok(doc) => {
                info!("recovered from {:?} (snapshot crashed before rename)", snapshot_new_path);
                return Ok(doc);
            }
            Err(e) => {
                warn!("{:?} present but unreadable ({}), falling back to snapshot", snapshot_new_path, e);
            }
        }
    }

    let snapshot_path = config.snapshot_path();
    let mut doc = snapshot::read_snapshot(&snapshot_path)
        .map_err(|e| DocumentError::Fatal(format!("no valid snapshot at {:?}: {}", snapshot_path, e)))?;

    let journal_path = config.journal_path();
    let file = match File::open(&journal_path) {
        Ok(file) => file,
        Err(_) => {
            info!("no journal at {:?}, snapshot alone is the recovered state", journal_path);
            return Ok(doc);
        }
    };

    let journal = match Journal::deserialize(BufReader::new(file), &config.type_tag, config.version) {
        Ok(journal) => journal,
        Err(e) => {
            warn!("journal at {:?} unreadable ({}), returning snapshot unmodified", journal_path, e);
            return Ok(doc);
        }
    };

    if let Err(e) = journal.apply_to(&mut doc) {
        warn!("journal replay failed ({}), returning snapshot unmodified", e);
        // `doc` may have been partially mutated by commands that applied
        // cleanly before the failing one; start over from a clean copy.
        doc = snapshot::read_snapshot(&snapshot_path)
            .expect("snapshot was readable moments ago and has not changed");
        return Ok(doc);
    }

    info!("replayed {} journal command(s) onto the snapshot", journal.len());
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::JournaledDocument;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn config(dir: &std::path::Path) -> DocumentConfig {
        DocumentConfig::new(dir.join("doc"), "widget", 1, 4096, 2048)
    }

    #[test]
    fn recovers_snapshot_plus_journal() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let doc = JournaledDocument::new(cfg.clone(), Value::empty_map()).unwrap();
        doc.add_command("name", Some(Value::String("alice".into()))).unwrap();
        doc.add_command("count", Some(Value::Int(1))).unwrap();
        // Intentionally do not close/snapshot: simulate a crash with an
        // un-flushed journal still on disk.
        std::mem::forget(doc);

        let recovered = load(&cfg).unwrap();
        let map = recovered.as_map().unwrap();
        assert_eq!(map.get("name"), Some(&Value::String("alice".into())));
        assert_eq!(map.get("count"), Some(&Value::Int(1)));
    }

    #[test]
    fn recovers_cleanly_after_a_graceful_close() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let doc = JournaledDocument::new(cfg.clone(), Value::empty_map()).unwrap();
        doc.add_command("name", Some(Value::String("alice".into()))).unwrap();
        doc.close().unwrap();

        // close() already reset the journal to an empty header for the
        // same schema, so recovery replays zero commands on top of the
        // snapshot that close() wrote.
        let recovered = load(&cfg).unwrap();
        assert_eq!(recovered.as_map().unwrap().get("name"), Some(&Value::String("alice".into())));
    }

    #[test]
    fn missing_snapshot_is_fatal() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let err = load(&cfg).unwrap_err();
        assert!(matches!(err, DocumentError::Fatal(_)));
    }

    #[test]
    fn corrupt_journal_falls_back_to_snapshot() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let doc = JournaledDocument::new(cfg.clone(), Value::empty_map()).unwrap();
        doc.add_command("name", Some(Value::String("alice".into()))).unwrap();
        std::mem::forget(doc);

        // Truncate the journal file mid-frame to simulate a torn write. Cut
        // a couple of bytes off the end of the real content (not the
        // sentinel-filled tail), so the read lands inside the command frame.
        let journal_path = cfg.journal_path();
        let bytes = std::fs::read(&journal_path).unwrap();
        let used = bytes.iter().rposition(|&b| b != 0x99).map(|i| i + 1).unwrap();
        std::fs::write(&journal_path, &bytes[..used - 2]).unwrap();

        let recovered = load(&cfg).unwrap();
        assert_eq!(recovered, Value::Map(BTreeMap::new()));
    }
}

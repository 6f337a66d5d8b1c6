//! Reading and writing a document's JSON snapshot file.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{DocumentError, Result};
use crate::value::Value;

/// Serialize `doc` as JSON and write it to `path`, truncating any existing
/// contents. Does not rename or otherwise make the write atomic relative
/// to a sibling file; callers that need the write-new/rename pattern
/// described for `P.snapshot.new` → `P.snapshot` compose this with
/// `std::fs::rename` themselves.
pub fn write_snapshot(path: &Path, doc: &Value) -> Result<()> {
    let mut file = File::create(path)?;
    serde_json::to_writer(&mut file, doc)?;
    file.flush()?;
    Ok(())
}

/// Read and deserialize the JSON snapshot at `path`. Fails with
/// `CorruptSnapshot` if the file doesn't parse as JSON or its root isn't a
/// map, since every document root is always a map.
pub fn read_snapshot(path: &Path) -> Result<Value> {
    let file = File::open(path)?;
    let doc: Value =
        serde_json::from_reader(file).map_err(|e| DocumentError::CorruptSnapshot(e.to_string()))?;
    if !matches!(doc, Value::Map(_)) {
        return Err(DocumentError::CorruptSnapshot("snapshot root is not a map".into()));
    }
    Ok(doc)
}

//! A fixed-capacity, append-only byte sink backed by a memory-mapped file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::error::{DocumentError, Result};

/// Fill byte for the unused tail of a journal stream. `0x99` is not a
/// valid UTF-8 lead byte, so a reader scanning for a frame header can use
/// it unambiguously as an end-of-journal marker.
pub const SENTINEL_BYTE: u8 = 0x99;

/// An append-only, fixed-capacity byte sink mapped to a file.
///
/// Writes are all-or-nothing: a write that doesn't fit in the remaining
/// capacity leaves the stream's position and contents completely
/// unchanged and returns [`DocumentError::BufferOverflow`].
pub struct MemoryMappedStream {
    mmap: MmapMut,
    capacity: usize,
    position: usize,
    fill_byte: u8,
    path: PathBuf,
}

impl MemoryMappedStream {
    /// Open (creating if necessary) the file at `path`, size it to
    /// `capacity` bytes, and fill it entirely with `fill_byte`.
    pub fn open(path: impl AsRef<Path>, capacity: usize, fill_byte: u8) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        file.set_len(capacity as u64)?;

        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        mmap.fill(fill_byte);
        mmap.flush()?;

        Ok(Self {
            mmap,
            capacity,
            position: 0,
            fill_byte,
            path,
        })
    }

    /// Total capacity in bytes, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written since the last `clear()`.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Capacity left before the next write would overflow.
    pub fn bytes_remaining(&self) -> usize {
        self.capacity - self.position
    }

    /// The path backing this stream.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `bytes` if they fit, or fail with `BufferOverflow` leaving
    /// the stream untouched.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.bytes_remaining() {
            return Err(DocumentError::BufferOverflow);
        }

        let start = self.position;
        let end = start + bytes.len();
        self.mmap[start..end].copy_from_slice(bytes);
        self.mmap.flush_range(start, bytes.len())?;
        self.position = end;
        Ok(())
    }

    /// Reset the stream to empty, overwriting the entire buffer with the
    /// fill byte.
    pub fn clear(&mut self) -> Result<()> {
        self.mmap.fill(self.fill_byte);
        self.mmap.flush()?;
        self.position = 0;
        Ok(())
    }

    /// A read-only view of the whole mapped capacity, including the
    /// unwritten, fill-byte tail.
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Flush and unmap. Equivalent to dropping the stream, spelled out for
    /// callers that want the release to be explicit (e.g. `close()`).
    pub fn close(mut self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

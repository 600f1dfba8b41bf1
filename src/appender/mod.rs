//! Buffered Appender Module
//!
//! Append-only file writer with a byte-threshold flush policy, used by
//! the write-ahead log to batch small records into fewer system calls.
//!
//! Callers submit **whole records**; the staging buffer is flushed as one
//! write once it reaches the configured threshold (or on [`flush`] /
//! [`sync`]), so a record never straddles a flush boundary and byte order
//! is preserved exactly.
//!
//! Rather than relying on platform append-mode semantics, the appender
//! tracks the on-disk end offset explicitly and seeks there before every
//! flush.
//!
//! [`flush`]: BufferedAppender::flush
//! [`sync`]: BufferedAppender::sync

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

// ------------------------------------------------------------------------------------------------
// Buffered Appender
// ------------------------------------------------------------------------------------------------

/// Append-only writer that stages records until a byte threshold.
#[derive(Debug)]
pub struct BufferedAppender {
    /// Underlying read/write file handle.
    file: File,

    /// Path of the file, kept for error context and tracing.
    path: PathBuf,

    /// Records accepted but not yet written to disk.
    staging: Vec<u8>,

    /// Staged-byte threshold that triggers a flush.
    buffer_size: usize,

    /// Bytes currently on disk; the next flush writes at this offset.
    end_offset: u64,
}

impl BufferedAppender {
    /// Opens (or creates) `path` for appending.
    pub fn open<P: AsRef<Path>>(path: P, buffer_size: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        let end_offset = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file,
            path,
            staging: Vec::with_capacity(buffer_size),
            buffer_size,
            end_offset,
        })
    }

    /// Stages one whole record, flushing when the threshold is reached.
    pub fn append(&mut self, record: &[u8]) -> io::Result<()> {
        self.staging.extend_from_slice(record);
        if self.staging.len() >= self.buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes every staged byte to disk.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.staging.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(self.end_offset))?;
        self.file.write_all(&self.staging)?;
        self.end_offset += self.staging.len() as u64;
        trace!(
            path = %self.path.display(),
            bytes = self.staging.len(),
            end = self.end_offset,
            "appender flushed"
        );
        self.staging.clear();
        Ok(())
    }

    /// Flushes and fsyncs.
    pub fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.file.sync_all()
    }

    /// Discards staged bytes and shrinks the file to `len` bytes.
    pub fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.staging.clear();
        self.file.set_len(len)?;
        self.end_offset = len;
        Ok(())
    }

    /// Logical size: on-disk bytes plus staged bytes.
    pub fn logical_len(&self) -> u64 {
        self.end_offset + self.staging.len() as u64
    }

    /// Bytes already durable on disk.
    pub fn disk_len(&self) -> u64 {
        self.end_offset
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BufferedAppender {
    fn drop(&mut self) {
        // Best-effort: staged records are not lost on a clean drop.
        let _ = self.flush();
        let _ = self.file.sync_all();
    }
}

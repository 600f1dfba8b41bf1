//! Write-Ahead Log (WAL) Module
//!
//! An append-only stream of operation records, written **before** the
//! memtable mutation so a crash can always be replayed back to the same
//! in-memory state. The WAL append is the commit point of the write
//! path.
//!
//! # On-disk layout
//!
//! ```text
//! [header length = 0x01][magic "WALF" (57 41 4C 46)]
//! [start 01 10 EF FE][record payload][end FE EF 10 01]
//! [start 01 10 EF FE][record payload][end FE EF 10 01]
//! ...
//! ```
//!
//! The payload layout — type tags, length fields, key, value, timestamp,
//! method byte — is owned by [`crate::record`]; exact offsets are pinned
//! by its tests.
//!
//! Records are framed through the [`crate::appender`] so many small
//! appends batch into one write; a record never straddles a flush
//! boundary.
//!
//! # Replay
//!
//! [`Wal::replay`] scans sequentially, validating delimiters and
//! decoding each record. The **first** malformed record — torn frame,
//! bad delimiter, unknown tag, short read — ends the replay rather than
//! failing it: a torn tail is the expected shape of a crash. Replayed
//! nodes are reinserted with their original timestamp and tombstone
//! flag.
//!
//! After a successful flush the engine truncates the log back to its
//! 5-byte prefix; rotation policy belongs to the engine, not the log.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::appender::BufferedAppender;
use crate::memtable::Memtable;
use crate::record::{DataNode, LogMethod, RecordError};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// WAL file magic (`b"WALF"`).
const WAL_MAGIC: [u8; 4] = [0x57, 0x41, 0x4C, 0x46];

/// Value of the header-length byte.
const WAL_HEADER_LEN: u8 = 0x01;

/// Bytes of the file prefix: header length plus magic.
pub const WAL_PREFIX_LEN: u64 = 5;

/// Frame start delimiter.
pub const LOG_START: [u8; 4] = [0x01, 0x10, 0xEF, 0xFE];

/// Frame end delimiter.
pub const LOG_END: [u8; 4] = [0xFE, 0xEF, 0x10, 0x01];

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record payload could not be encoded or decoded.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// The file prefix is not a WAL prefix.
    #[error("malformed WAL file {path}: {detail}")]
    Format {
        /// Path of the offending file.
        path: PathBuf,
        /// What was violated, expected vs. actual.
        detail: String,
    },
}

// ------------------------------------------------------------------------------------------------
// WAL Core
// ------------------------------------------------------------------------------------------------

/// Append-only operation log backed by a buffered appender.
#[derive(Debug)]
pub struct Wal {
    /// Buffered writer owning the file handle.
    appender: BufferedAppender,

    /// Path of the log file.
    path: PathBuf,
}

impl Wal {
    /// Opens or creates the log at `path`.
    ///
    /// A fresh file receives the 5-byte prefix immediately; an existing
    /// one must start with it. `buffer_size` is the number of staged
    /// bytes between file flushes.
    pub fn open<P: AsRef<Path>>(path: P, buffer_size: usize) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let mut appender = BufferedAppender::open(&path, buffer_size)?;

        if appender.logical_len() == 0 {
            let mut prefix = Vec::with_capacity(WAL_PREFIX_LEN as usize);
            prefix.push(WAL_HEADER_LEN);
            prefix.extend_from_slice(&WAL_MAGIC);
            appender.append(&prefix)?;
            appender.sync()?;
            info!(path = %path.display(), "WAL created");
        } else {
            Self::validate_prefix(&path)?;
            debug!(path = %path.display(), bytes = appender.logical_len(), "WAL opened");
        }

        Ok(Self { appender, path })
    }

    /// Appends one operation record.
    ///
    /// The frame is `start_delim · payload · end_delim`, staged as one
    /// unit so it can never be split across flush boundaries.
    pub fn append(&mut self, node: &DataNode, method: LogMethod) -> Result<(), WalError> {
        let payload = node.encode_log_payload(method);
        let mut frame = Vec::with_capacity(payload.len() + 8);
        frame.extend_from_slice(&LOG_START);
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&LOG_END);
        self.appender.append(&frame)?;
        trace!(key = %node.key(), ?method, bytes = frame.len(), "WAL record appended");
        Ok(())
    }

    /// Replays every intact record into `memtable`, in append order.
    ///
    /// Returns the number of records applied. The first malformed record
    /// truncates the replay at that point — it is treated as the torn
    /// tail of a crashed write, not as an error.
    pub fn replay(&mut self, memtable: &mut Memtable) -> Result<usize, WalError> {
        self.appender.flush()?;
        let bytes = fs::read(&self.path)?;
        Self::check_prefix(&self.path, &bytes)?;

        let mut cursor = WAL_PREFIX_LEN as usize;
        let mut applied = 0usize;

        while cursor + LOG_START.len() <= bytes.len() {
            if bytes[cursor..cursor + 4] != LOG_START {
                warn!(offset = cursor, "WAL start delimiter mismatch, ending replay");
                break;
            }
            let payload_at = cursor + 4;
            let (node, method, consumed) = match DataNode::decode_log_payload(&bytes[payload_at..])
            {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!(offset = cursor, error = %e, "torn WAL record, ending replay");
                    break;
                }
            };
            let end_at = payload_at + consumed;
            if end_at + 4 > bytes.len() || bytes[end_at..end_at + 4] != LOG_END {
                warn!(offset = cursor, "WAL end delimiter missing, ending replay");
                break;
            }

            trace!(key = %node.key(), ?method, "WAL record replayed");
            memtable.insert(node);
            applied += 1;
            cursor = end_at + 4;
        }

        info!(path = %self.path.display(), records = applied, "WAL replay finished");
        Ok(applied)
    }

    /// Resets the log to its 5-byte prefix, discarding staged records.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.appender.truncate(WAL_PREFIX_LEN)?;
        self.appender.sync()?;
        info!(path = %self.path.display(), "WAL truncated");
        Ok(())
    }

    /// Flushes staged records and fsyncs.
    pub fn sync(&mut self) -> Result<(), WalError> {
        self.appender.sync()?;
        Ok(())
    }

    /// Logical size in bytes, staged records included.
    pub fn logical_len(&self) -> u64 {
        self.appender.logical_len()
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and checks the prefix of an existing file.
    fn validate_prefix(path: &Path) -> Result<(), WalError> {
        let mut prefix = [0u8; WAL_PREFIX_LEN as usize];
        let mut file = fs::File::open(path)?;
        io::Read::read_exact(&mut file, &mut prefix).map_err(|_| WalError::Format {
            path: path.to_path_buf(),
            detail: "file shorter than the 5-byte prefix".into(),
        })?;
        Self::check_prefix(path, &prefix)
    }

    fn check_prefix(path: &Path, bytes: &[u8]) -> Result<(), WalError> {
        if bytes.len() < WAL_PREFIX_LEN as usize {
            return Err(WalError::Format {
                path: path.to_path_buf(),
                detail: "file shorter than the 5-byte prefix".into(),
            });
        }
        if bytes[0] != WAL_HEADER_LEN {
            return Err(WalError::Format {
                path: path.to_path_buf(),
                detail: format!("header length {} (expected {WAL_HEADER_LEN})", bytes[0]),
            });
        }
        if bytes[1..5] != WAL_MAGIC {
            return Err(WalError::Format {
                path: path.to_path_buf(),
                detail: format!("magic {:02X?} (expected {WAL_MAGIC:02X?})", &bytes[1..5]),
            });
        }
        Ok(())
    }
}

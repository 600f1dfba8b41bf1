//! Storage Engine Module
//!
//! The engine is the **memtable ↔ table pipeline**: it owns one
//! write-ahead log, one double-buffered memtable, and the ordered set of
//! tables a directory holds, and it wires the write and read paths
//! through them.
//!
//! ## Write path
//!
//! ```text
//! put/delete → WAL append → memtable insert → (threshold) flush:
//!     lock primary → swap in wait buffer → write outgoing records to a
//!     new table → rebuild its index and bloom → truncate the WAL
//! ```
//!
//! The WAL append is the **commit point**: an operation that reached the
//! log but not the memtable is recovered by replay, exactly as if the
//! process had crashed right after the append.
//!
//! ## Read path
//!
//! ```text
//! memtable (primary, then wait) → tables newest-first:
//!     bloom probe → sparse index → bounded block read → binary search
//! ```
//!
//! A tombstone found at any layer shadows every older record for that
//! key, so the engine reports the key as absent.
//!
//! ## Recovery
//!
//! [`Engine::open`] replays the WAL into a fresh memtable and discovers
//! existing `table-NNNNNN.sst` files in sequence order. Replay of a
//! threshold-crossing log triggers an immediate flush, so the engine
//! never starts with a locked memtable.
//!
//! ## Concurrency model
//!
//! The engine is single-threaded; the double-buffer handoff is the only
//! writer/flusher coordination it needs. Hosts that wrap it in threads
//! can serialize access with the [`utils::ReentrantLock`] utility.

// ------------------------------------------------------------------------------------------------
// Sub-modules
// ------------------------------------------------------------------------------------------------

pub mod utils;


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bloom::BloomHashFn;
use crate::memtable::{Memtable, MemtableEvents, MemtableStats};
use crate::record::{DataNode, LogMethod};
use crate::sstable::{SSTable, TableConfig, TableError};
use crate::types::{PrimitiveType, TypeError, Value};
use crate::wal::{Wal, WalError};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// File name of the engine's write-ahead log.
const WAL_FILE: &str = "wal.log";

/// Prefix of table file names (`table-000001.sst`).
const TABLE_PREFIX: &str = "table-";

/// Extension of table data files.
const TABLE_EXT: &str = "sst";

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Error originating from a table.
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// Error originating from the write-ahead log.
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    /// Key or value did not match the engine's declared types.
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// Underlying filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Configuration for an [`Engine`] instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of records per table.
    pub size: usize,

    /// Records per logical block (sparse index and cache granularity).
    pub block_size: usize,

    /// Declared key type of every record.
    pub key_type: PrimitiveType,

    /// Declared value type of every record.
    pub value_type: PrimitiveType,

    /// Table format version.
    pub version: u8,

    /// Compression flag; identity (0) required.
    pub compression: u8,

    /// Encoding flag; identity (0) required.
    pub encoding: u8,

    /// Custom bloom hash injected into every table.
    pub custom_hash: Option<BloomHashFn>,

    /// Bloom filter target false-positive rate.
    pub bloom_error_rate: f64,

    /// Memtable record count that triggers a flush.
    pub memtable_threshold: usize,

    /// Staged WAL bytes between file flushes.
    pub wal_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            size: 1000,
            block_size: 100,
            key_type: PrimitiveType::U64,
            value_type: PrimitiveType::U64,
            version: 1,
            compression: 0,
            encoding: 0,
            custom_hash: None,
            bloom_error_rate: 0.01,
            memtable_threshold: 500,
            wal_buffer_size: 4096,
        }
    }
}

impl EngineConfig {
    /// Per-table view of this configuration.
    fn table_config(&self) -> TableConfig {
        TableConfig {
            size: self.size,
            block_size: self.block_size,
            key_type: self.key_type,
            value_type: self.value_type,
            version: self.version,
            compression: self.compression,
            encoding: self.encoding,
            bloom_error_rate: self.bloom_error_rate,
            custom_hash: self.custom_hash,
        }
    }
}

/// Snapshot of engine state returned by [`Engine::stats`].
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    /// Memtable buffer sizes and lock state.
    pub memtable: MemtableStats,

    /// Number of tables on disk.
    pub table_count: usize,

    /// Total records across all tables.
    pub table_records: usize,
}

// ------------------------------------------------------------------------------------------------
// Flush signal
// ------------------------------------------------------------------------------------------------

/// The pipeline's subscription to the memtable's events.
///
/// `needs_flush` latches a flag the write path checks after each insert;
/// `buffer_opened` needs no action in a synchronous pipeline.
#[derive(Default)]
struct FlushSignal {
    requested: AtomicBool,
}

impl FlushSignal {
    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

impl MemtableEvents for FlushSignal {
    fn needs_flush(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

// ------------------------------------------------------------------------------------------------
// Engine
// ------------------------------------------------------------------------------------------------

/// The single-node storage engine handle.
pub struct Engine {
    /// Directory holding the WAL and every table.
    dir: PathBuf,

    /// Engine configuration.
    config: EngineConfig,

    /// Operation log; appended before every memtable mutation.
    wal: Wal,

    /// In-memory write buffer.
    memtable: Memtable,

    /// Tables in creation order; read newest-first.
    tables: Vec<SSTable>,

    /// Sequence number of the next table file.
    next_table_seq: u64,

    /// Latched flush request from the memtable.
    flush_signal: Arc<FlushSignal>,
}

impl Engine {
    /// Opens (or creates) an engine rooted at `dir`.
    ///
    /// Replays the WAL into a fresh memtable and opens every existing
    /// table in sequence order. A replay that crosses the flush
    /// threshold is flushed before the engine is returned.
    pub fn open<P: AsRef<Path>>(dir: P, config: EngineConfig) -> Result<Self, EngineError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut wal = Wal::open(dir.join(WAL_FILE), config.wal_buffer_size)?;
        let mut memtable = Memtable::new(config.memtable_threshold);
        let replayed = wal.replay(&mut memtable)?;
        if replayed > 0 {
            info!(records = replayed, "recovered memtable from WAL");
        }

        let mut tables = Vec::new();
        let mut next_table_seq = 1;
        for seq in discover_table_seqs(&dir)? {
            let path = table_path(&dir, seq);
            tables.push(SSTable::open(&path, config.table_config())?);
            next_table_seq = seq + 1;
        }

        let flush_signal = Arc::new(FlushSignal::default());
        memtable.set_observer(flush_signal.clone());

        let mut engine = Self {
            dir,
            config,
            wal,
            memtable,
            tables,
            next_table_seq,
            flush_signal,
        };

        // A replayed log can already be over the threshold.
        if engine.memtable.needs_flush() {
            engine.flush()?;
        }

        info!(
            dir = %engine.dir.display(),
            tables = engine.tables.len(),
            "engine opened"
        );
        Ok(engine)
    }

    /// Inserts or overwrites `key`.
    ///
    /// The WAL append is the commit point; the memtable mutation follows
    /// it, and a threshold crossing flushes synchronously.
    pub fn put(&mut self, key: Value, value: Value) -> Result<(), EngineError> {
        let node = DataNode::new(key, value, self.config.key_type, self.config.value_type)?;
        self.wal.append(&node, LogMethod::Append)?;
        self.memtable.insert(node);
        self.maybe_flush()
    }

    /// Deletes `key` by inserting a tombstone.
    pub fn delete(&mut self, key: Value) -> Result<(), EngineError> {
        let node = DataNode::tombstone(
            key,
            self.config.key_type,
            self.config.value_type,
            crate::record::now_millis(),
        )?;
        self.wal.append(&node, LogMethod::Delete)?;
        self.memtable.insert(node);
        self.maybe_flush()
    }

    /// Latest visible value for `key`, or `None` when absent or
    /// tombstoned.
    ///
    /// Consults the memtable first (primary, then wait buffer), then
    /// every table newest-first, so a later tombstone shadows an earlier
    /// write wherever the two records live.
    pub fn get(&mut self, key: &Value) -> Result<Option<Value>, EngineError> {
        if let Some(node) = self.memtable.get(key) {
            return Ok(visible_value(node));
        }
        for table in self.tables.iter_mut().rev() {
            if !table.may_have(key) {
                continue;
            }
            if let Some(node) = table.read_key(key)? {
                return Ok(visible_value(&node));
            }
        }
        Ok(None)
    }

    /// Whether `key` currently resolves to a live value.
    pub fn contains(&mut self, key: &Value) -> Result<bool, EngineError> {
        Ok(self.get(key)?.is_some())
    }

    /// Flushes the memtable into a new table and truncates the WAL.
    ///
    /// Records that accumulated in the wait buffer during the handoff
    /// stay in the memtable; they are re-logged into the fresh WAL so a
    /// crash immediately after the truncation loses nothing.
    pub fn flush(&mut self) -> Result<(), EngineError> {
        let outgoing = self.memtable.flush();
        self.flush_signal.take();

        if outgoing.is_empty() {
            debug!("flush requested on empty buffer, skipping table emission");
        } else {
            let path = table_path(&self.dir, self.next_table_seq);
            let mut table = SSTable::open(&path, self.config.table_config())?;
            table.write(&outgoing)?;
            info!(path = %path.display(), records = outgoing.len(), "memtable flushed");
            self.tables.push(table);
            self.next_table_seq += 1;
        }

        self.wal.truncate()?;
        for (_, node) in self.memtable.peek_all() {
            let method = if node.deleted() {
                LogMethod::Delete
            } else {
                LogMethod::Append
            };
            self.wal.append(&node, method)?;
        }
        self.wal.sync()?;
        Ok(())
    }

    /// Tables in creation order (oldest first).
    pub fn tables(&self) -> &[SSTable] {
        &self.tables
    }

    /// Mutable table access for external collaborators (compaction).
    pub fn tables_mut(&mut self) -> &mut [SSTable] {
        &mut self.tables
    }

    /// Memtable and table counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            memtable: self.memtable.stats(),
            table_count: self.tables.len(),
            table_records: self.tables.iter().map(SSTable::len).sum(),
        }
    }

    /// Directory this engine is rooted at.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Syncs the WAL and closes every table.
    pub fn close(mut self) -> Result<(), EngineError> {
        self.wal.sync()?;
        for table in self.tables.drain(..) {
            table.close()?;
        }
        info!(dir = %self.dir.display(), "engine closed");
        Ok(())
    }

    /// Runs a flush when the memtable signalled one.
    fn maybe_flush(&mut self) -> Result<(), EngineError> {
        if self.flush_signal.take() || self.memtable.needs_flush() {
            self.flush()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("dir", &self.dir)
            .field("tables", &self.tables.len())
            .finish_non_exhaustive()
    }
}

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

/// Resolves a tombstone-aware node to its visible value.
fn visible_value(node: &DataNode) -> Option<Value> {
    if node.deleted() {
        None
    } else {
        Some(node.value().clone())
    }
}

/// Path of the table file with sequence number `seq`.
fn table_path(dir: &Path, seq: u64) -> PathBuf {
    dir.join(format!("{TABLE_PREFIX}{seq:06}.{TABLE_EXT}"))
}

/// Existing table sequence numbers under `dir`, ascending.
fn discover_table_seqs(dir: &Path) -> io::Result<Vec<u64>> {
    let mut seqs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(stem) = name
            .strip_prefix(TABLE_PREFIX)
            .and_then(|s| s.strip_suffix(&format!(".{TABLE_EXT}")))
        else {
            continue;
        };
        match stem.parse::<u64>() {
            Ok(seq) => seqs.push(seq),
            Err(_) => warn!(file = name, "ignoring file with malformed table name"),
        }
    }
    seqs.sort_unstable();
    Ok(seqs)
}

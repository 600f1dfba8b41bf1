//! Sorted String Table (SSTable) Module
//!
//! An SSTable is an **immutable-after-flush**, key-ordered file of
//! fixed-width records, together with two sidecar files:
//!
//! - `<name>.idx` — the sparse index (first key of each block → absolute
//!   file offset of that block),
//! - `<name>.bloom` — the bloom filter bits, persisted verbatim.
//!
//! All three files are created, opened, and deleted together.
//!
//! # On-disk layout (version 1)
//!
//! | Offset | Size      | Field                                          |
//! |--------|-----------|------------------------------------------------|
//! | 0      | 1         | header length = 5                              |
//! | 1      | 4         | magic `b"SSTT"`                                |
//! | 5      | 1         | version                                        |
//! | 6      | 1         | metadata length = 3                            |
//! | 7      | 1         | value-type tag                                 |
//! | 8      | 1         | key-type tag                                   |
//! | 9      | 1         | record width = 25 + width(key) + width(value)  |
//! | 10     | 1         | reserved filler `0x0A`                         |
//! | 11     | width × N | packed records                                 |
//!
//! Version 2 widens the record-width field to a little-endian `u16`
//! (metadata length 4, records start at offset 12); type pairs whose
//! record width exceeds 255 bytes require it. Record bytes themselves
//! are identical across versions — see [`crate::record`].
//!
//! ## Design Invariants
//!
//! - Records are in strictly ascending key order; keys are unique within
//!   one table (the upstream memtable deduplicates).
//! - `min_key` / `max_key` are the first and last decoded keys.
//! - For any key `K` in the table, the block holding `K` starts at the
//!   offset returned by the index's greatest-key-≤-`K` query.
//! - Every index offset is aligned to the record width after the fixed
//!   prefix and lies inside the file; violations are invariant errors.
//!
//! # Read path
//!
//! bloom probe (miss → definitively absent) → sparse-index
//! `greatest_le` → one bounded block read (LFU cache first) → binary
//! search over the record stride inside the block.
//!
//! # Concurrency model
//!
//! The table does not serialize its own operations; the owning engine
//! keeps reads and writes mutually exclusive. A cancelled read leaves
//! the cache and index untouched.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::bloom::{BloomFilter, BloomHashFn};
use crate::cache::BlockCache;
use crate::index::{IndexError, SortedArray};
use crate::record::{DataNode, RecordError, record_width};
use crate::types::{PrimitiveType, TypeError, Value};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Table file magic (`b"SSTT"`).
const TABLE_MAGIC: [u8; 4] = [0x53, 0x53, 0x54, 0x54];

/// Value of the header-length byte: magic plus version.
const HEADER_LEN: u8 = 5;

/// Reserved filler byte closing the metadata section.
const FILLER: u8 = 0x0A;

/// Table format versions this build reads and writes.
pub const SUPPORTED_VERSIONS: [u8; 2] = [1, 2];

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by SSTable operations.
#[derive(Debug, Error)]
pub enum TableError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Type codec failure.
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// Record-level decode failure.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Index sidecar failure.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Structural mismatch in the table file itself.
    #[error("malformed table file {path}: {detail}")]
    Format {
        /// Path of the offending file.
        path: PathBuf,
        /// What was violated, expected vs. actual.
        detail: String,
    },

    /// More records than the table's declared capacity.
    #[error("table {path} over capacity: {capacity} records declared, {attempted} attempted")]
    Capacity {
        /// Path of the table.
        path: PathBuf,
        /// Declared capacity in records.
        capacity: usize,
        /// Record count that was attempted.
        attempted: usize,
    },

    /// A sidecar disagrees with the data file.
    #[error("table {path} invariant violated: {detail}")]
    Invariant {
        /// Path of the table.
        path: PathBuf,
        /// Description of the violation.
        detail: String,
    },
}

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Static configuration of one table.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Maximum number of records the table may hold.
    pub size: usize,

    /// Records per logical block; granularity of the sparse index and
    /// the block cache.
    pub block_size: usize,

    /// Declared key type.
    pub key_type: PrimitiveType,

    /// Declared value type.
    pub value_type: PrimitiveType,

    /// Table format version; must be in [`SUPPORTED_VERSIONS`].
    pub version: u8,

    /// Compression flag; only the identity value 0 is supported.
    pub compression: u8,

    /// Encoding flag; only the identity value 0 is supported.
    pub encoding: u8,

    /// Target bloom filter false-positive rate.
    pub bloom_error_rate: f64,

    /// Custom bloom hash, replacing the type-dispatched default.
    pub custom_hash: Option<BloomHashFn>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            size: 1000,
            block_size: 100,
            key_type: PrimitiveType::U64,
            value_type: PrimitiveType::U64,
            version: 1,
            compression: 0,
            encoding: 0,
            bloom_error_rate: 0.01,
            custom_hash: None,
        }
    }
}

impl TableConfig {
    /// Validates the configuration against a table path.
    fn validate(&self, path: &Path) -> Result<(), TableError> {
        let format = |detail: String| TableError::Format {
            path: path.to_path_buf(),
            detail,
        };
        if !SUPPORTED_VERSIONS.contains(&self.version) {
            return Err(format(format!("unsupported version {}", self.version)));
        }
        if self.compression != 0 {
            return Err(format(format!(
                "unsupported compression flag {} (only identity 0)",
                self.compression
            )));
        }
        if self.encoding != 0 {
            return Err(format(format!(
                "unsupported encoding flag {} (only identity 0)",
                self.encoding
            )));
        }
        if self.size == 0 || self.block_size == 0 {
            return Err(format("size and block_size must be nonzero".into()));
        }
        let width = record_width(self.key_type, self.value_type);
        if self.version == 1 && width > 255 {
            return Err(TableError::Type(TypeError::WidthUnrepresentable { width }));
        }
        Ok(())
    }

    /// Offset of the first record for this version.
    fn data_start(&self) -> u64 {
        match self.version {
            1 => 11,
            _ => 12,
        }
    }

    /// Metadata-length byte for this version.
    fn metadata_len(&self) -> u8 {
        match self.version {
            1 => 3,
            _ => 4,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// SSTable
// ------------------------------------------------------------------------------------------------

/// One on-disk table plus its in-memory sparse index, bloom filter, and
/// block cache.
pub struct SSTable {
    /// Path of the data file.
    path: PathBuf,

    /// Path of the `.idx` sidecar.
    index_path: PathBuf,

    /// Path of the `.bloom` sidecar.
    bloom_path: PathBuf,

    /// Read/write handle on the data file.
    file: File,

    /// Static configuration this table was opened with.
    config: TableConfig,

    /// Width of one packed record in bytes.
    record_width: usize,

    /// Offset of the first record.
    data_start: u64,

    /// Number of records currently in the file.
    record_count: usize,

    /// First key, when the table is non-empty.
    min_key: Option<Value>,

    /// Last key, when the table is non-empty.
    max_key: Option<Value>,

    /// Sparse index: first key of each block → block offset.
    index: SortedArray,

    /// Per-table bloom filter.
    bloom: BloomFilter,

    /// LFU cache of raw blocks, keyed by block offset.
    cache: BlockCache,
}

impl SSTable {
    /// Opens or creates the table at `path` together with its sidecars.
    ///
    /// An empty data file is initialized with header, metadata, and
    /// filler. A non-empty one is validated against the configuration;
    /// `min_key`/`max_key` come from the first and last records, and the
    /// sidecars are loaded (or rebuilt from the data when absent).
    pub fn open<P: AsRef<Path>>(path: P, config: TableConfig) -> Result<Self, TableError> {
        let path = path.as_ref().to_path_buf();
        config.validate(&path)?;

        let index_path = path.with_extension("idx");
        let bloom_path = path.with_extension("bloom");

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        let file_len = file.metadata()?.len();

        let record_width = record_width(config.key_type, config.value_type);
        let data_start = config.data_start();
        let cache_blocks = config.size.div_ceil(config.block_size);

        let mut table = Self {
            bloom: BloomFilter::new(config.size, config.bloom_error_rate, config.custom_hash),
            cache: BlockCache::new(cache_blocks),
            index: SortedArray::with_capacity(cache_blocks),
            record_width,
            data_start,
            record_count: 0,
            min_key: None,
            max_key: None,
            path: path.clone(),
            index_path,
            bloom_path,
            file,
            config,
        };

        if file_len == 0 {
            let header = table.build_header();
            table.file.write_all(&header)?;
            table.file.sync_all()?;
            info!(path = %table.path.display(), version = table.config.version, "table created");
            return Ok(table);
        }

        table.validate_header(file_len)?;
        table.record_count = ((file_len - data_start) / record_width as u64) as usize;
        table.load_boundary_keys()?;
        table.load_sidecars()?;

        info!(
            path = %table.path.display(),
            records = table.record_count,
            version = table.config.version,
            "table opened"
        );
        Ok(table)
    }

    // --------------------------------------------------------------------------------------------
    // Getters
    // --------------------------------------------------------------------------------------------

    /// Path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Smallest key in the table.
    pub fn min_key(&self) -> Option<&Value> {
        self.min_key.as_ref()
    }

    /// Largest key in the table.
    pub fn max_key(&self) -> Option<&Value> {
        self.max_key.as_ref()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.record_count
    }

    /// Whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Declared capacity in records.
    pub fn capacity(&self) -> usize {
        self.config.size
    }

    // --------------------------------------------------------------------------------------------
    // Write path
    // --------------------------------------------------------------------------------------------

    /// Replaces the table contents with `records`.
    ///
    /// Records must be in strictly ascending key order (the memtable
    /// emits them that way). The index and bloom filter are rebuilt from
    /// scratch, the block cache is cleared, and the sidecars rewritten.
    pub fn write(&mut self, records: &[DataNode]) -> Result<(), TableError> {
        if records.len() > self.config.size {
            return Err(TableError::Capacity {
                path: self.path.clone(),
                capacity: self.config.size,
                attempted: records.len(),
            });
        }
        self.check_ascending(records, None)?;

        let mut buf = Vec::with_capacity(records.len() * self.record_width);
        for record in records {
            buf.extend_from_slice(&record.encode_table_record());
        }

        self.file.set_len(self.data_start)?;
        self.file.seek(SeekFrom::Start(self.data_start))?;
        self.file.write_all(&buf)?;
        self.file.sync_all()?;

        self.record_count = records.len();
        self.min_key = records.first().map(|r| r.key().clone());
        self.max_key = records.last().map(|r| r.key().clone());

        self.index.clear();
        self.bloom.clear();
        for (position, record) in records.iter().enumerate() {
            if position % self.config.block_size == 0 {
                let offset = self.data_start + (position * self.record_width) as u64;
                self.index.set(record.key().clone(), offset);
            }
            self.bloom.add(record.key());
        }
        self.cache.clear();
        self.persist_sidecars()?;

        debug!(path = %self.path.display(), records = records.len(), "table rewritten");
        Ok(())
    }

    /// Extends the table with `records`, all keyed after `max_key`.
    pub fn append(&mut self, records: &[DataNode]) -> Result<(), TableError> {
        if records.is_empty() {
            return Ok(());
        }
        let attempted = self.record_count + records.len();
        if attempted > self.config.size {
            return Err(TableError::Capacity {
                path: self.path.clone(),
                capacity: self.config.size,
                attempted,
            });
        }
        self.check_ascending(records, self.max_key.as_ref())?;

        let mut buf = Vec::with_capacity(records.len() * self.record_width);
        for record in records {
            buf.extend_from_slice(&record.encode_table_record());
        }

        let write_at = self.data_start + (self.record_count * self.record_width) as u64;
        self.file.seek(SeekFrom::Start(write_at))?;
        self.file.write_all(&buf)?;
        self.file.sync_all()?;

        // A short tail block may already be cached; its copy no longer
        // covers the records just written.
        if self.record_count % self.config.block_size != 0 {
            self.cache.clear();
        }

        for (position, record) in records.iter().enumerate() {
            let global = self.record_count + position;
            if global % self.config.block_size == 0 {
                let offset = self.data_start + (global * self.record_width) as u64;
                self.index.set(record.key().clone(), offset);
            }
            self.bloom.add(record.key());
        }

        if self.min_key.is_none() {
            self.min_key = records.first().map(|r| r.key().clone());
        }
        self.max_key = records.last().map(|r| r.key().clone());
        self.record_count = attempted;
        self.persist_sidecars()?;

        debug!(
            path = %self.path.display(),
            appended = records.len(),
            total = self.record_count,
            "table extended"
        );
        Ok(())
    }

    // --------------------------------------------------------------------------------------------
    // Read path
    // --------------------------------------------------------------------------------------------

    /// Point lookup.
    ///
    /// A bloom miss answers "absent" without touching the file;
    /// otherwise one block is read (cache first) and binary-searched
    /// over the record stride. Tombstones are returned as-is —
    /// shadowing is the engine's concern.
    pub fn read_key(&mut self, key: &Value) -> Result<Option<DataNode>, TableError> {
        if self.record_count == 0 {
            return Ok(None);
        }
        if !self.bloom.lookup(key) {
            trace!(path = %self.path.display(), %key, "bloom filtered read");
            return Ok(None);
        }
        let Some(&(_, block_offset)) = self.index.greatest_le(key) else {
            return Ok(None);
        };

        let block = self.read_block(block_offset)?;
        let stride = self.record_width;
        let key_width = self.config.key_type.width();

        let mut lo = 0usize;
        let mut hi = block.len() / stride;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let record_bytes = &block[mid * stride..(mid + 1) * stride];
            let mid_key = self.config.key_type.decode(&record_bytes[12..12 + key_width])?;
            match mid_key.cmp(key) {
                std::cmp::Ordering::Equal => {
                    let absolute = block_offset + (mid * stride) as u64;
                    let node = DataNode::decode_table_record(
                        record_bytes,
                        self.config.key_type,
                        self.config.value_type,
                        absolute as i64,
                    )?;
                    return Ok(Some(node));
                }
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        Ok(None)
    }

    /// Reads the first `count` records in key order, bypassing the index.
    pub fn read_first_n(&mut self, count: usize) -> Result<Vec<DataNode>, TableError> {
        let take = count.min(self.record_count);
        if take == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; take * self.record_width];
        self.file.seek(SeekFrom::Start(self.data_start))?;
        self.file.read_exact(&mut buf)?;

        let mut records = Vec::with_capacity(take);
        for (position, chunk) in buf.chunks_exact(self.record_width).enumerate() {
            let offset = self.data_start + (position * self.record_width) as u64;
            records.push(DataNode::decode_table_record(
                chunk,
                self.config.key_type,
                self.config.value_type,
                offset as i64,
            )?);
        }
        Ok(records)
    }

    /// Reads every record in key order.
    pub fn read_all(&mut self) -> Result<Vec<DataNode>, TableError> {
        self.read_first_n(self.record_count)
    }

    /// Bloom-only existence probe; `false` is definitive.
    pub fn may_have(&self, key: &Value) -> bool {
        self.record_count > 0 && self.bloom.lookup(key)
    }

    /// Whether the table holds a live (non-tombstone) record for `key`.
    pub fn has(&mut self, key: &Value) -> Result<bool, TableError> {
        if self.index.has(key) {
            return Ok(true);
        }
        Ok(self
            .read_key(key)?
            .map(|node| !node.deleted())
            .unwrap_or(false))
    }

    /// Timed lookup of the smallest key; `None` when the table is empty
    /// or the read fails.
    pub fn ping(&mut self) -> Option<Duration> {
        let min_key = self.min_key.clone()?;
        let started = Instant::now();
        match self.read_key(&min_key) {
            Ok(Some(_)) => Some(started.elapsed()),
            Ok(None) | Err(_) => {
                warn!(path = %self.path.display(), "ping failed");
                None
            }
        }
    }

    // --------------------------------------------------------------------------------------------
    // Lifecycle
    // --------------------------------------------------------------------------------------------

    /// Syncs and closes the table.
    pub fn close(self) -> Result<(), TableError> {
        self.file.sync_all()?;
        debug!(path = %self.path.display(), "table closed");
        Ok(())
    }

    /// Closes the table and deletes all three files.
    pub fn unlink(self) -> Result<(), TableError> {
        let Self {
            path,
            index_path,
            bloom_path,
            file,
            ..
        } = self;
        drop(file);
        fs::remove_file(&path)?;
        remove_if_present(&index_path)?;
        remove_if_present(&bloom_path)?;
        info!(path = %path.display(), "table unlinked");
        Ok(())
    }

    // --------------------------------------------------------------------------------------------
    // Internals
    // --------------------------------------------------------------------------------------------

    /// Serializes header, metadata, and filler for an empty file.
    fn build_header(&self) -> Vec<u8> {
        let width = self.record_width;
        let mut buf = Vec::with_capacity(self.data_start as usize);
        buf.push(HEADER_LEN);
        buf.extend_from_slice(&TABLE_MAGIC);
        buf.push(self.config.version);
        buf.push(self.config.metadata_len());
        buf.push(self.config.value_type.tag());
        buf.push(self.config.key_type.tag());
        match self.config.version {
            1 => buf.push(width as u8),
            _ => buf.extend_from_slice(&(width as u16).to_le_bytes()),
        }
        buf.push(FILLER);
        buf
    }

    /// Validates a non-empty file against the configuration.
    fn validate_header(&mut self, file_len: u64) -> Result<(), TableError> {
        let path = self.path.clone();
        let format = |detail: String| TableError::Format {
            path: path.clone(),
            detail,
        };

        if file_len < self.data_start {
            return Err(format(format!(
                "file is {file_len} bytes, header needs {}",
                self.data_start
            )));
        }

        let mut header = vec![0u8; self.data_start as usize];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut header)?;

        if header[0] != HEADER_LEN {
            return Err(format(format!(
                "header length {} (expected {HEADER_LEN})",
                header[0]
            )));
        }
        if header[1..5] != TABLE_MAGIC {
            return Err(format(format!(
                "magic {:02X?} (expected {TABLE_MAGIC:02X?})",
                &header[1..5]
            )));
        }
        let version = header[5];
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(format(format!("unsupported version {version}")));
        }
        if version != self.config.version {
            return Err(format(format!(
                "version {version} does not match configured version {}",
                self.config.version
            )));
        }
        if header[6] != self.config.metadata_len() {
            return Err(format(format!(
                "metadata length {} (expected {})",
                header[6],
                self.config.metadata_len()
            )));
        }
        if header[7] != self.config.value_type.tag() {
            return Err(format(format!(
                "value tag 0x{:02X} does not match configured {} (0x{:02X})",
                header[7],
                self.config.value_type,
                self.config.value_type.tag()
            )));
        }
        if header[8] != self.config.key_type.tag() {
            return Err(format(format!(
                "key tag 0x{:02X} does not match configured {} (0x{:02X})",
                header[8],
                self.config.key_type,
                self.config.key_type.tag()
            )));
        }
        let declared_width = match version {
            1 => header[9] as usize,
            _ => u16::from_le_bytes([header[9], header[10]]) as usize,
        };
        if declared_width != self.record_width {
            return Err(format(format!(
                "record width {declared_width} (expected {})",
                self.record_width
            )));
        }
        let filler = header[self.data_start as usize - 1];
        if filler != FILLER {
            return Err(format(format!(
                "reserved byte 0x{filler:02X} (expected 0x{FILLER:02X})"
            )));
        }

        let region = file_len - self.data_start;
        if region % self.record_width as u64 != 0 {
            return Err(format(format!(
                "data region of {region} bytes is not a multiple of record width {}",
                self.record_width
            )));
        }
        Ok(())
    }

    /// Decodes the first and last record to seed `min_key` / `max_key`.
    fn load_boundary_keys(&mut self) -> Result<(), TableError> {
        if self.record_count == 0 {
            return Ok(());
        }
        let first = self.read_record_at(0)?;
        let last = self.read_record_at(self.record_count - 1)?;
        self.min_key = Some(first.key().clone());
        self.max_key = Some(last.key().clone());
        Ok(())
    }

    /// Loads both sidecars, rebuilding them from the data file when
    /// either is missing or empty while records exist.
    fn load_sidecars(&mut self) -> Result<(), TableError> {
        let index_bytes = read_if_present(&self.index_path)?;
        let bloom_bytes = read_if_present(&self.bloom_path)?;

        if self.record_count > 0 && (index_bytes.is_empty() || bloom_bytes.is_empty()) {
            warn!(path = %self.path.display(), "sidecars missing, rebuilding from data file");
            return self.rebuild_sidecars();
        }

        if !bloom_bytes.is_empty() {
            self.bloom.load_bits(bloom_bytes);
        }
        if !index_bytes.is_empty() {
            self.index = SortedArray::deserialize(&index_bytes, self.config.key_type)?;
            self.verify_index_offsets()?;
        }
        Ok(())
    }

    /// Every index offset must point at a record boundary inside the file.
    fn verify_index_offsets(&self) -> Result<(), TableError> {
        let file_len = self.data_start + (self.record_count * self.record_width) as u64;
        for (key, offset) in self.index.iter() {
            if *offset < self.data_start
                || *offset >= file_len
                || (*offset - self.data_start) % self.record_width as u64 != 0
            {
                return Err(TableError::Invariant {
                    path: self.path.clone(),
                    detail: format!(
                        "index offset {offset} for key {key} outside data region [{}, {file_len})",
                        self.data_start
                    ),
                });
            }
        }
        Ok(())
    }

    /// Rescans the data file and regenerates index, bloom, and sidecars.
    fn rebuild_sidecars(&mut self) -> Result<(), TableError> {
        self.index.clear();
        self.bloom.clear();
        let records = self.read_all()?;
        for (position, record) in records.iter().enumerate() {
            if position % self.config.block_size == 0 {
                let offset = self.data_start + (position * self.record_width) as u64;
                self.index.set(record.key().clone(), offset);
            }
            self.bloom.add(record.key());
        }
        self.persist_sidecars()?;
        debug!(path = %self.path.display(), records = records.len(), "sidecars rebuilt");
        Ok(())
    }

    /// Writes both sidecar files.
    fn persist_sidecars(&mut self) -> Result<(), TableError> {
        fs::write(&self.index_path, self.index.serialize(self.config.key_type)?)?;
        fs::write(&self.bloom_path, self.bloom.bits().as_bytes())?;
        Ok(())
    }

    /// Reads the block starting at `block_offset`, cache first.
    fn read_block(&mut self, block_offset: u64) -> Result<Vec<u8>, TableError> {
        if let Some(block) = self.cache.get(block_offset) {
            trace!(path = %self.path.display(), offset = block_offset, "block cache hit");
            return Ok(block);
        }

        let file_len = self.data_start + (self.record_count * self.record_width) as u64;
        let full_block = (self.config.block_size * self.record_width) as u64;
        let len = full_block.min(file_len.saturating_sub(block_offset)) as usize;

        let mut block = vec![0u8; len];
        self.file.seek(SeekFrom::Start(block_offset))?;
        self.file.read_exact(&mut block)?;
        self.cache.put(block_offset, block.clone());
        trace!(
            path = %self.path.display(),
            offset = block_offset,
            bytes = len,
            "block read from disk"
        );
        Ok(block)
    }

    /// Reads and decodes the record at insertion position `position`.
    fn read_record_at(&mut self, position: usize) -> Result<DataNode, TableError> {
        let offset = self.data_start + (position * self.record_width) as u64;
        let mut buf = vec![0u8; self.record_width];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(DataNode::decode_table_record(
            &buf,
            self.config.key_type,
            self.config.value_type,
            offset as i64,
        )?)
    }

    /// Records must arrive strictly ascending and after `floor`.
    fn check_ascending(
        &self,
        records: &[DataNode],
        floor: Option<&Value>,
    ) -> Result<(), TableError> {
        let mut previous = floor;
        for record in records {
            if let Some(prev) = previous {
                if record.key() <= prev {
                    return Err(TableError::Invariant {
                        path: self.path.clone(),
                        detail: format!(
                            "record key {} is not strictly greater than {prev}",
                            record.key()
                        ),
                    });
                }
            }
            previous = Some(record.key());
        }
        Ok(())
    }
}

impl std::fmt::Debug for SSTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTable")
            .field("path", &self.path)
            .field("records", &self.record_count)
            .field("version", &self.config.version)
            .finish_non_exhaustive()
    }
}

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

fn read_if_present(path: &Path) -> io::Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

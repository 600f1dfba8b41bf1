//! Sparse Index Module
//!
//! Each table keeps a [`SortedArray`] mapping the **first key of every
//! block** to that block's absolute file offset. The array is tiny
//! (`table_capacity / block_size` entries), lives fully in memory, and is
//! persisted as the table's `.idx` sidecar.
//!
//! ## Design Invariants
//!
//! - Keys are appended in monotonically non-decreasing order by the write
//!   path; duplicates overwrite in place.
//! - For any key `K` present in the table, the block containing `K`
//!   starts at the offset returned by [`SortedArray::greatest_le`].
//! - Bound queries (`lower_bound`, `upper_bound`, `greatest_le`) are
//!   O(log n) binary searches; `set` is O(1) amortized on the ordered
//!   append path.
//!
//! # Sidecar format
//!
//! Written in a length-prefixed binary layout:
//!
//! ```text
//! [magic "SIDX"(4)][version(1)][key-type tag(1)][count u32 LE]
//! [key bytes (fixed width)][offset u64 LE]   × count
//! [crc32 LE over everything after the magic]
//! ```
//!
//! The legacy human-readable format — `key,offset,key,offset,…` — is
//! still accepted on read (detected by the absence of the magic) so that
//! existing sidecars migrate on the next rewrite. The text form cannot
//! represent string keys containing commas; the binary form can.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use crc32fast::Hasher as Crc32;
use thiserror::Error;
use tracing::{debug, trace};

use crate::types::{PrimitiveType, TypeError, Value};

/// Magic prefix of the binary sidecar layout.
const SIDECAR_MAGIC: [u8; 4] = *b"SIDX";

/// Current binary sidecar version.
const SIDECAR_VERSION: u8 = 1;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors raised while serializing or deserializing an index sidecar.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Key bytes could not be encoded or decoded.
    #[error("type error in index sidecar: {0}")]
    Type(#[from] TypeError),

    /// Structural corruption in the sidecar bytes.
    #[error("malformed index sidecar: {detail}")]
    Format {
        /// What was violated, with expected vs. actual where known.
        detail: String,
    },
}

// ------------------------------------------------------------------------------------------------
// SortedArray
// ------------------------------------------------------------------------------------------------

/// Append-ordered associative container over `(key, offset)` pairs.
#[derive(Debug, Default)]
pub struct SortedArray {
    /// Entries in ascending key order.
    entries: Vec<(Value, u64)>,
}

impl SortedArray {
    /// Creates an empty array with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Inserts or overwrites the offset stored under `key`.
    ///
    /// The write path appends keys in non-decreasing order, which makes
    /// this a plain push; an existing key is overwritten in place, and an
    /// out-of-order key falls back to a positioned insert.
    pub fn set(&mut self, key: Value, offset: u64) {
        match self.entries.last() {
            Some((last, _)) if *last < key => self.entries.push((key, offset)),
            None => self.entries.push((key, offset)),
            _ => match self.entries.binary_search_by(|(k, _)| k.cmp(&key)) {
                Ok(position) => self.entries[position].1 = offset,
                Err(position) => self.entries.insert(position, (key, offset)),
            },
        }
    }

    /// Returns the offset stored under exactly `key`.
    pub fn get(&self, key: &Value) -> Option<u64> {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|position| self.entries[position].1)
    }

    /// Whether exactly `key` is present.
    pub fn has(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// The entry at insertion position `index`.
    pub fn at(&self, index: usize) -> Option<&(Value, u64)> {
        self.entries.get(index)
    }

    /// Smallest entry with key ≥ `key`.
    pub fn lower_bound(&self, key: &Value) -> Option<&(Value, u64)> {
        let position = self.entries.partition_point(|(k, _)| k < key);
        self.entries.get(position)
    }

    /// Smallest entry with key > `key`.
    pub fn upper_bound(&self, key: &Value) -> Option<&(Value, u64)> {
        let position = self.entries.partition_point(|(k, _)| k <= key);
        self.entries.get(position)
    }

    /// Largest entry with key ≤ `key`.
    pub fn greatest_le(&self, key: &Value) -> Option<&(Value, u64)> {
        let position = self.entries.partition_point(|(k, _)| k <= key);
        position.checked_sub(1).and_then(|p| self.entries.get(p))
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the array holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = &(Value, u64)> {
        self.entries.iter()
    }

    /// Serializes to the binary sidecar layout.
    pub fn serialize(&self, key_type: PrimitiveType) -> Result<Vec<u8>, IndexError> {
        let mut buf = Vec::with_capacity(10 + self.entries.len() * (key_type.width() + 8) + 4);
        buf.extend_from_slice(&SIDECAR_MAGIC);
        buf.push(SIDECAR_VERSION);
        buf.push(key_type.tag());
        buf.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for (key, offset) in &self.entries {
            buf.extend_from_slice(&key_type.encode(key)?);
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        let mut hasher = Crc32::new();
        hasher.update(&buf[SIDECAR_MAGIC.len()..]);
        buf.extend_from_slice(&hasher.finalize().to_le_bytes());
        trace!(entries = self.entries.len(), "index sidecar serialized");
        Ok(buf)
    }

    /// Deserializes a sidecar, accepting both the binary and the legacy
    /// text layout.
    pub fn deserialize(bytes: &[u8], key_type: PrimitiveType) -> Result<Self, IndexError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        if bytes.starts_with(&SIDECAR_MAGIC) {
            Self::deserialize_binary(bytes, key_type)
        } else {
            debug!("index sidecar in legacy text layout, migrating on next rewrite");
            Self::deserialize_text(bytes, key_type)
        }
    }

    fn deserialize_binary(bytes: &[u8], key_type: PrimitiveType) -> Result<Self, IndexError> {
        let key_width = key_type.width();
        let header_len = SIDECAR_MAGIC.len() + 2 + 4;
        if bytes.len() < header_len + 4 {
            return Err(IndexError::Format {
                detail: format!("sidecar truncated at {} bytes", bytes.len()),
            });
        }

        let (payload, crc_bytes) = bytes.split_at(bytes.len() - 4);
        let mut hasher = Crc32::new();
        hasher.update(&payload[SIDECAR_MAGIC.len()..]);
        let computed = hasher.finalize();
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if computed != stored {
            return Err(IndexError::Format {
                detail: format!("sidecar checksum mismatch: stored {stored:08x}, computed {computed:08x}"),
            });
        }

        let version = payload[4];
        if version != SIDECAR_VERSION {
            return Err(IndexError::Format {
                detail: format!("unsupported sidecar version {version}"),
            });
        }
        let tag = payload[5];
        if tag != key_type.tag() {
            return Err(IndexError::Format {
                detail: format!(
                    "sidecar key tag 0x{tag:02X} does not match table key tag 0x{:02X}",
                    key_type.tag()
                ),
            });
        }

        let count = u32::from_le_bytes([payload[6], payload[7], payload[8], payload[9]]) as usize;
        let body = &payload[header_len..];
        let entry_width = key_width + 8;
        if body.len() != count * entry_width {
            return Err(IndexError::Format {
                detail: format!(
                    "sidecar body holds {} bytes, {count} entries require {}",
                    body.len(),
                    count * entry_width
                ),
            });
        }

        let mut array = Self::with_capacity(count);
        for entry in body.chunks_exact(entry_width) {
            let key = key_type.decode(&entry[..key_width])?;
            let mut offset_bytes = [0u8; 8];
            offset_bytes.copy_from_slice(&entry[key_width..]);
            array.set(key, u64::from_le_bytes(offset_bytes));
        }
        Ok(array)
    }

    fn deserialize_text(bytes: &[u8], key_type: PrimitiveType) -> Result<Self, IndexError> {
        let text = std::str::from_utf8(bytes).map_err(|e| IndexError::Format {
            detail: format!("legacy sidecar is not UTF-8: {e}"),
        })?;
        let trimmed = text.trim_end_matches(['\n', ',']);
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let fields: Vec<&str> = trimmed.split(',').collect();
        if fields.len() % 2 != 0 {
            return Err(IndexError::Format {
                detail: format!("legacy sidecar has {} fields, expected key,offset pairs", fields.len()),
            });
        }

        let mut array = Self::with_capacity(fields.len() / 2);
        for pair in fields.chunks_exact(2) {
            let key = key_type.parse_string(pair[0])?;
            let offset = pair[1].parse::<u64>().map_err(|_| IndexError::Format {
                detail: format!("legacy sidecar offset {:?} is not an integer", pair[1]),
            })?;
            array.set(key, offset);
        }
        Ok(array)
    }
}

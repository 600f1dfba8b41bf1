//! Data Record Module
//!
//! A [`DataNode`] is the engine's logical record: a typed key, a typed
//! value, a millisecond timestamp, and a tombstone flag. Nodes are
//! created by the write path, buffered in the memtable, and serialized
//! into two wire formats:
//!
//! # Table record layout
//!
//! ```text
//! [start "STAR"(4)][key_len u32 LE(4)][value_len u32 LE(4)]
//! [key bytes][value bytes]
//! [timestamp binary64 LE(8)][deleted(1)][end "ENDE"(4)]
//! ```
//!
//! Both lengths are fixed by the declared types, so every record of one
//! table has the same width: `25 + width(key) + width(value)` bytes.
//!
//! # Log record payload layout
//!
//! The write-ahead log frames each record between its own delimiters;
//! the payload in between is:
//!
//! ```text
//! [key tag(1)][value tag(1)][key_len u32 LE(4)][value_len u32 LE(4)]
//! [key bytes][value bytes][timestamp binary64 LE(8)][method(1)]
//! ```
//!
//! ## Design Invariants
//!
//! - `data_buffer` is the concatenation of the encoded key and value and
//!   always spans `width(key_type) + width(value_type)` bytes.
//! - Every produced record carries a nonzero timestamp.
//! - A tombstone (`deleted = true`) carries the zero sentinel of its
//!   declared value type, so deleted records keep the full record width.
//! - `offset` is the record's byte offset in its table file, or −1 while
//!   the node lives in memory.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::types::{PrimitiveType, TypeError, Value, decode_timestamp, encode_timestamp};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Start delimiter of a table record (`b"STAR"`).
pub const RECORD_START: [u8; 4] = [0x53, 0x54, 0x41, 0x52];

/// End delimiter of a table record (`b"ENDE"`).
pub const RECORD_END: [u8; 4] = [0x45, 0x4E, 0x44, 0x45];

/// Fixed bytes of a table record around the key and value:
/// start(4) + key_len(4) + value_len(4) + timestamp(8) + deleted(1) + end(4).
pub const RECORD_OVERHEAD: usize = 25;

/// Fixed bytes of a log record payload around the key and value:
/// tags(2) + key_len(4) + value_len(4) + timestamp(8) + method(1).
pub const LOG_PAYLOAD_OVERHEAD: usize = 19;

/// Sentinel offset of a node that has not been placed in a table file.
pub const OFFSET_UNPLACED: i64 = -1;

/// Total table-record width for a key/value type pair.
pub fn record_width(key_type: PrimitiveType, value_type: PrimitiveType) -> usize {
    RECORD_OVERHEAD + key_type.width() + value_type.width()
}

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors raised while decoding a serialized record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Key or value bytes failed type decoding.
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// The buffer ended before the record did.
    #[error("record truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes the record layout requires.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A start or end delimiter did not match.
    #[error("bad {which} delimiter: expected {expected:02X?}, got {actual:02X?}")]
    Delimiter {
        /// Which delimiter was violated (`"start"` or `"end"`).
        which: &'static str,
        /// The delimiter bytes the layout requires.
        expected: [u8; 4],
        /// The bytes actually read.
        actual: [u8; 4],
    },

    /// A declared length field disagrees with the declared type's width.
    #[error("declared {which} length {declared} does not match type width {width}")]
    LengthMismatch {
        /// Which field was violated (`"key"` or `"value"`).
        which: &'static str,
        /// Length read from the record.
        declared: u32,
        /// Width the declared type requires.
        width: usize,
    },

    /// The tombstone flag byte was neither 0 nor 1.
    #[error("invalid tombstone byte 0x{byte:02X}")]
    TombstoneByte {
        /// The byte actually read.
        byte: u8,
    },

    /// The log method byte was neither append nor delete.
    #[error("unknown log method byte 0x{byte:02X}")]
    UnknownMethod {
        /// The byte actually read.
        byte: u8,
    },
}

// ------------------------------------------------------------------------------------------------
// Log method
// ------------------------------------------------------------------------------------------------

/// The operation kind recorded in the write-ahead log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMethod {
    /// Insert or overwrite a key.
    Append,
    /// Delete a key (tombstone).
    Delete,
}

impl LogMethod {
    /// On-disk method byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Append => 0,
            Self::Delete => 1,
        }
    }

    /// Resolves an on-disk method byte.
    pub fn from_byte(byte: u8) -> Result<Self, RecordError> {
        match byte {
            0 => Ok(Self::Append),
            1 => Ok(Self::Delete),
            byte => Err(RecordError::UnknownMethod { byte }),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// DataNode
// ------------------------------------------------------------------------------------------------

/// One logical key/value record.
#[derive(Debug, Clone, PartialEq)]
pub struct DataNode {
    key: Value,
    value: Value,
    key_type: PrimitiveType,
    value_type: PrimitiveType,

    /// Milliseconds since the UNIX epoch; always nonzero.
    timestamp: u64,

    /// Tombstone flag; a deleted node masks earlier records for its key.
    deleted: bool,

    /// Byte offset in the table file, or [`OFFSET_UNPLACED`].
    offset: i64,

    /// Pre-encoded key bytes followed by value bytes.
    data_buffer: Vec<u8>,
}

impl DataNode {
    /// Creates a live record stamped with the current wall clock.
    pub fn new(
        key: Value,
        value: Value,
        key_type: PrimitiveType,
        value_type: PrimitiveType,
    ) -> Result<Self, TypeError> {
        Self::with_timestamp(key, value, key_type, value_type, now_millis())
    }

    /// Creates a live record with an explicit timestamp.
    pub fn with_timestamp(
        key: Value,
        value: Value,
        key_type: PrimitiveType,
        value_type: PrimitiveType,
        timestamp: u64,
    ) -> Result<Self, TypeError> {
        let mut data_buffer = key_type.encode(&key)?;
        data_buffer.extend_from_slice(&value_type.encode(&value)?);
        Ok(Self {
            key,
            value,
            key_type,
            value_type,
            timestamp,
            deleted: false,
            offset: OFFSET_UNPLACED,
            data_buffer,
        })
    }

    /// Creates a tombstone carrying the zero sentinel of the value type.
    pub fn tombstone(
        key: Value,
        key_type: PrimitiveType,
        value_type: PrimitiveType,
        timestamp: u64,
    ) -> Result<Self, TypeError> {
        let mut node =
            Self::with_timestamp(key, value_type.zero(), key_type, value_type, timestamp)?;
        node.deleted = true;
        Ok(node)
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn key_type(&self) -> PrimitiveType {
        self.key_type
    }

    pub fn value_type(&self) -> PrimitiveType {
        self.value_type
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Whether this node is a tombstone.
    pub fn deleted(&self) -> bool {
        self.deleted
    }

    /// Byte offset in the table file, or [`OFFSET_UNPLACED`].
    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub(crate) fn set_offset(&mut self, offset: i64) {
        self.offset = offset;
    }

    /// The pre-encoded key and value bytes.
    pub fn data_buffer(&self) -> &[u8] {
        &self.data_buffer
    }

    /// Total width of this node's table record.
    pub fn table_record_width(&self) -> usize {
        RECORD_OVERHEAD + self.data_buffer.len()
    }

    // --------------------------------------------------------------------------------------------
    // Table record codec
    // --------------------------------------------------------------------------------------------

    /// Encodes this node into the table record layout.
    pub fn encode_table_record(&self) -> Vec<u8> {
        let key_width = self.key_type.width();
        let value_width = self.value_type.width();
        let mut buf = Vec::with_capacity(self.table_record_width());
        buf.extend_from_slice(&RECORD_START);
        buf.extend_from_slice(&(key_width as u32).to_le_bytes());
        buf.extend_from_slice(&(value_width as u32).to_le_bytes());
        buf.extend_from_slice(&self.data_buffer);
        buf.extend_from_slice(&encode_timestamp(self.timestamp));
        buf.push(u8::from(self.deleted));
        buf.extend_from_slice(&RECORD_END);
        buf
    }

    /// Decodes a table record of the declared type pair.
    ///
    /// `offset` is the record's absolute position in the table file and
    /// is stored on the returned node.
    pub fn decode_table_record(
        bytes: &[u8],
        key_type: PrimitiveType,
        value_type: PrimitiveType,
        offset: i64,
    ) -> Result<Self, RecordError> {
        let key_width = key_type.width();
        let value_width = value_type.width();
        let width = RECORD_OVERHEAD + key_width + value_width;
        if bytes.len() < width {
            return Err(RecordError::Truncated {
                needed: width,
                available: bytes.len(),
            });
        }
        let bytes = &bytes[..width];

        check_delimiter("start", &bytes[0..4], RECORD_START)?;
        check_delimiter("end", &bytes[width - 4..], RECORD_END)?;

        let declared_key_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if declared_key_len as usize != key_width {
            return Err(RecordError::LengthMismatch {
                which: "key",
                declared: declared_key_len,
                width: key_width,
            });
        }
        let declared_value_len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if declared_value_len as usize != value_width {
            return Err(RecordError::LengthMismatch {
                which: "value",
                declared: declared_value_len,
                width: value_width,
            });
        }

        let data_start = 12;
        let data_end = data_start + key_width + value_width;
        let key = key_type.decode(&bytes[data_start..data_start + key_width])?;
        let value = value_type.decode(&bytes[data_start + key_width..data_end])?;

        let mut ts_bytes = [0u8; 8];
        ts_bytes.copy_from_slice(&bytes[data_end..data_end + 8]);
        let timestamp = decode_timestamp(ts_bytes);

        let deleted = match bytes[data_end + 8] {
            0 => false,
            1 => true,
            byte => return Err(RecordError::TombstoneByte { byte }),
        };

        Ok(Self {
            key,
            value,
            key_type,
            value_type,
            timestamp,
            deleted,
            offset,
            data_buffer: bytes[data_start..data_end].to_vec(),
        })
    }

    // --------------------------------------------------------------------------------------------
    // Log record codec
    // --------------------------------------------------------------------------------------------

    /// Encodes this node into a log record payload (the bytes between
    /// the log's start and end delimiters).
    pub fn encode_log_payload(&self, method: LogMethod) -> Vec<u8> {
        let key_width = self.key_type.width();
        let value_width = self.value_type.width();
        let mut buf = Vec::with_capacity(LOG_PAYLOAD_OVERHEAD + self.data_buffer.len());
        buf.push(self.key_type.tag());
        buf.push(self.value_type.tag());
        buf.extend_from_slice(&(key_width as u32).to_le_bytes());
        buf.extend_from_slice(&(value_width as u32).to_le_bytes());
        buf.extend_from_slice(&self.data_buffer);
        buf.extend_from_slice(&encode_timestamp(self.timestamp));
        buf.push(method.as_byte());
        buf
    }

    /// Decodes a log record payload starting at `bytes[0]`.
    ///
    /// Returns the node, the recorded method, and the number of payload
    /// bytes consumed. The string width hint comes from the declared
    /// length fields, which makes the decoder total over valid payloads.
    pub fn decode_log_payload(bytes: &[u8]) -> Result<(Self, LogMethod, usize), RecordError> {
        if bytes.len() < LOG_PAYLOAD_OVERHEAD {
            return Err(RecordError::Truncated {
                needed: LOG_PAYLOAD_OVERHEAD,
                available: bytes.len(),
            });
        }

        let key_len = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;
        let value_len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
        let key_type = PrimitiveType::from_tag(bytes[0], key_len)?;
        let value_type = PrimitiveType::from_tag(bytes[1], value_len)?;

        if key_len != key_type.width() {
            return Err(RecordError::LengthMismatch {
                which: "key",
                declared: key_len as u32,
                width: key_type.width(),
            });
        }
        if value_len != value_type.width() {
            return Err(RecordError::LengthMismatch {
                which: "value",
                declared: value_len as u32,
                width: value_type.width(),
            });
        }

        let consumed = LOG_PAYLOAD_OVERHEAD + key_len + value_len;
        if bytes.len() < consumed {
            return Err(RecordError::Truncated {
                needed: consumed,
                available: bytes.len(),
            });
        }

        let data_start = 10;
        let data_end = data_start + key_len + value_len;
        let key = key_type.decode(&bytes[data_start..data_start + key_len])?;
        let value = value_type.decode(&bytes[data_start + key_len..data_end])?;

        let mut ts_bytes = [0u8; 8];
        ts_bytes.copy_from_slice(&bytes[data_end..data_end + 8]);
        let timestamp = decode_timestamp(ts_bytes);

        let method = LogMethod::from_byte(bytes[data_end + 8])?;

        // Tombstones carry the sentinel regardless of what was logged.
        let node = if method == LogMethod::Delete {
            Self::tombstone(key, key_type, value_type, timestamp)?
        } else {
            Self {
                key,
                value,
                key_type,
                value_type,
                timestamp,
                deleted: false,
                offset: OFFSET_UNPLACED,
                data_buffer: bytes[data_start..data_end].to_vec(),
            }
        };
        Ok((node, method, consumed))
    }
}

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

fn check_delimiter(which: &'static str, actual: &[u8], expected: [u8; 4]) -> Result<(), RecordError> {
    if actual != expected {
        let mut got = [0u8; 4];
        got.copy_from_slice(&actual[..4]);
        return Err(RecordError::Delimiter {
            which,
            expected,
            actual: got,
        });
    }
    Ok(())
}

/// Current wall clock in milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(1)
}

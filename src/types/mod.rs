//! Primitive Type Codec
//!
//! Every key and value stored by the engine belongs to a **closed set of
//! primitive types**, each with a fixed encoded width. Type information
//! travels alongside the data (as one-byte tags in table metadata and WAL
//! records), so decoders are total: given a tag and a byte slice there is
//! exactly one way to interpret it.
//!
//! # Wire format
//!
//! | Type     | Tag    | Width | Encoding                                  |
//! |----------|--------|-------|-------------------------------------------|
//! | `bool`   | `0x01` | 1     | `0x00` = false, `0x01` = true             |
//! | `i8`     | `0x02` | 1     | two's complement                          |
//! | `u8`     | `0x03` | 1     | raw byte                                  |
//! | `i16`    | `0x04` | 2     | two's complement, little-endian           |
//! | `u16`    | `0x05` | 2     | little-endian                             |
//! | `f32`    | `0x08` | 4     | IEEE-754 binary32, little-endian          |
//! | `i32`    | `0x09` | 4     | two's complement, little-endian           |
//! | `u32`    | `0x0A` | 4     | little-endian                             |
//! | `f64`    | `0x0C` | 8     | IEEE-754 binary64, little-endian          |
//! | `i64`    | `0x0D` | 8     | two's complement, little-endian           |
//! | `u64`    | `0x0E` | 8     | little-endian                             |
//! | `str:N`  | `0x10` | N     | raw bytes, zero-padded or truncated to N  |
//!
//! Tags are grouped by encoded width: one-byte types start at `0x01`,
//! two-byte at `0x04`, four-byte at `0x08`, eight-byte at `0x0C`, and
//! fixed-length strings sit at `0x10`. The tag alone does not determine
//! the width of `str:N`; callers recover `N` from a length hint (the
//! declared key/value length fields of the surrounding format).
//!
//! # Timestamps
//!
//! Record timestamps are integral millisecond counts encoded as the
//! little-endian bit pattern of the corresponding IEEE-754 binary64 value.
//! A zero timestamp encodes to eight zero bytes. Decoding reads a binary64
//! and truncates to an integer. Millisecond counts are exactly
//! representable up to 2^53, far beyond any realistic wall clock.
//!
//! # Ordering
//!
//! [`Value`] implements a total order so it can key ordered maps: values
//! of the same type compare naturally (floats via `total_cmp`, strings
//! lexicographically); values of different types compare by tag. Within
//! one table every key shares a single declared type, so the cross-type
//! arm only exists to make the order total.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors produced by the primitive type codec.
#[derive(Debug, Error)]
pub enum TypeError {
    /// A type tag read from disk is not in the closed set.
    #[error("unknown type tag 0x{tag:02X}")]
    UnknownTag {
        /// The tag byte that was read.
        tag: u8,
    },

    /// A byte slice does not have the width the declared type requires.
    #[error("width mismatch for {type_name}: expected {expected} bytes, got {actual}")]
    WidthMismatch {
        /// Human-readable name of the declared type.
        type_name: &'static str,
        /// Width the type requires.
        expected: usize,
        /// Width that was actually supplied.
        actual: usize,
    },

    /// A value variant does not match the declared type.
    #[error("kind mismatch: declared {declared}, value is {actual}")]
    KindMismatch {
        /// Name of the declared type.
        declared: &'static str,
        /// Name of the value's actual type.
        actual: &'static str,
    },

    /// A textual representation could not be parsed as the declared type.
    #[error("cannot parse {text:?} as {type_name}")]
    Unparsable {
        /// The offending text.
        text: String,
        /// Name of the target type.
        type_name: &'static str,
    },

    /// Decoded string bytes were not valid UTF-8.
    #[error("invalid UTF-8 in string value: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A record width does not fit the one-byte field of the version-1
    /// table format.
    #[error("record width {width} exceeds the version-1 limit of 255 bytes")]
    WidthUnrepresentable {
        /// The combined record width that overflowed the field.
        width: usize,
    },
}

// ------------------------------------------------------------------------------------------------
// Primitive type tags
// ------------------------------------------------------------------------------------------------

/// The closed set of primitive key/value types.
///
/// `Str` carries its fixed byte length `N`; all other variants have an
/// intrinsic width. Two `Str` types with different lengths are distinct
/// types with distinct widths but share the tag `0x10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    F32,
    I32,
    U32,
    F64,
    I64,
    U64,
    /// Fixed-length string of `N` bytes.
    Str(usize),
}

impl PrimitiveType {
    /// Returns the encoded width of this type in bytes.
    pub fn width(&self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::F64 | Self::I64 | Self::U64 => 8,
            Self::Str(n) => *n,
        }
    }

    /// Returns the one-byte on-disk tag of this type.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Bool => 0x01,
            Self::I8 => 0x02,
            Self::U8 => 0x03,
            Self::I16 => 0x04,
            Self::U16 => 0x05,
            Self::F32 => 0x08,
            Self::I32 => 0x09,
            Self::U32 => 0x0A,
            Self::F64 => 0x0C,
            Self::I64 => 0x0D,
            Self::U64 => 0x0E,
            Self::Str(_) => 0x10,
        }
    }

    /// Resolves a tag byte back into a type.
    ///
    /// `length_hint` is only consulted for the string tag, where it names
    /// the fixed byte length `N` (taken from the surrounding format's
    /// declared length field).
    pub fn from_tag(tag: u8, length_hint: usize) -> Result<Self, TypeError> {
        match tag {
            0x01 => Ok(Self::Bool),
            0x02 => Ok(Self::I8),
            0x03 => Ok(Self::U8),
            0x04 => Ok(Self::I16),
            0x05 => Ok(Self::U16),
            0x08 => Ok(Self::F32),
            0x09 => Ok(Self::I32),
            0x0A => Ok(Self::U32),
            0x0C => Ok(Self::F64),
            0x0D => Ok(Self::I64),
            0x0E => Ok(Self::U64),
            0x10 => Ok(Self::Str(length_hint)),
            tag => Err(TypeError::UnknownTag { tag }),
        }
    }

    /// Human-readable type name, used in error context and tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::F32 => "f32",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F64 => "f64",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::Str(_) => "str",
        }
    }

    /// Encodes `value` as this type's little-endian byte sequence.
    ///
    /// The encoded length always equals [`PrimitiveType::width`]. Strings
    /// are zero-padded or truncated to the fixed length.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, TypeError> {
        let mismatch = || TypeError::KindMismatch {
            declared: self.name(),
            actual: value.type_name(),
        };
        let bytes = match (self, value) {
            (Self::Bool, Value::Bool(v)) => vec![u8::from(*v)],
            (Self::I8, Value::I8(v)) => v.to_le_bytes().to_vec(),
            (Self::U8, Value::U8(v)) => v.to_le_bytes().to_vec(),
            (Self::I16, Value::I16(v)) => v.to_le_bytes().to_vec(),
            (Self::U16, Value::U16(v)) => v.to_le_bytes().to_vec(),
            (Self::F32, Value::F32(v)) => v.to_le_bytes().to_vec(),
            (Self::I32, Value::I32(v)) => v.to_le_bytes().to_vec(),
            (Self::U32, Value::U32(v)) => v.to_le_bytes().to_vec(),
            (Self::F64, Value::F64(v)) => v.to_le_bytes().to_vec(),
            (Self::I64, Value::I64(v)) => v.to_le_bytes().to_vec(),
            (Self::U64, Value::U64(v)) => v.to_le_bytes().to_vec(),
            (Self::Str(n), Value::Str(s)) => {
                let mut buf = s.as_bytes().to_vec();
                buf.resize(*n, 0);
                buf
            }
            _ => return Err(mismatch()),
        };
        Ok(bytes)
    }

    /// Decodes a byte slice of exactly [`PrimitiveType::width`] bytes.
    ///
    /// Trailing zero padding of string values is stripped.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, TypeError> {
        if bytes.len() != self.width() {
            return Err(TypeError::WidthMismatch {
                type_name: self.name(),
                expected: self.width(),
                actual: bytes.len(),
            });
        }
        let value = match self {
            Self::Bool => Value::Bool(bytes[0] != 0),
            Self::I8 => Value::I8(bytes[0] as i8),
            Self::U8 => Value::U8(bytes[0]),
            Self::I16 => Value::I16(i16::from_le_bytes([bytes[0], bytes[1]])),
            Self::U16 => Value::U16(u16::from_le_bytes([bytes[0], bytes[1]])),
            Self::F32 => Value::F32(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            Self::I32 => Value::I32(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            Self::U32 => Value::U32(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            Self::F64 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(bytes);
                Value::F64(f64::from_le_bytes(arr))
            }
            Self::I64 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(bytes);
                Value::I64(i64::from_le_bytes(arr))
            }
            Self::U64 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(bytes);
                Value::U64(u64::from_le_bytes(arr))
            }
            Self::Str(_) => {
                let end = bytes
                    .iter()
                    .rposition(|&b| b != 0)
                    .map_or(0, |pos| pos + 1);
                Value::Str(String::from_utf8(bytes[..end].to_vec())?)
            }
        };
        Ok(value)
    }

    /// Parses a textual representation into a typed value.
    ///
    /// Used when reading the legacy human-readable index sidecar format.
    pub fn parse_string(&self, text: &str) -> Result<Value, TypeError> {
        let unparsable = || TypeError::Unparsable {
            text: text.to_string(),
            type_name: self.name(),
        };
        let value = match self {
            Self::Bool => match text {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(unparsable()),
            },
            Self::I8 => Value::I8(text.parse().map_err(|_| unparsable())?),
            Self::U8 => Value::U8(text.parse().map_err(|_| unparsable())?),
            Self::I16 => Value::I16(text.parse().map_err(|_| unparsable())?),
            Self::U16 => Value::U16(text.parse().map_err(|_| unparsable())?),
            Self::F32 => Value::F32(text.parse().map_err(|_| unparsable())?),
            Self::I32 => Value::I32(text.parse().map_err(|_| unparsable())?),
            Self::U32 => Value::U32(text.parse().map_err(|_| unparsable())?),
            Self::F64 => Value::F64(text.parse().map_err(|_| unparsable())?),
            Self::I64 => Value::I64(text.parse().map_err(|_| unparsable())?),
            Self::U64 => Value::U64(text.parse().map_err(|_| unparsable())?),
            Self::Str(_) => Value::Str(text.to_string()),
        };
        Ok(value)
    }

    /// The zero sentinel of this type.
    ///
    /// Tombstone records carry this value so that every record — deleted
    /// or not — occupies the full declared width on disk.
    pub fn zero(&self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::I8 => Value::I8(0),
            Self::U8 => Value::U8(0),
            Self::I16 => Value::I16(0),
            Self::U16 => Value::U16(0),
            Self::F32 => Value::F32(0.0),
            Self::I32 => Value::I32(0),
            Self::U32 => Value::U32(0),
            Self::F64 => Value::F64(0.0),
            Self::I64 => Value::I64(0),
            Self::U64 => Value::U64(0),
            Self::Str(_) => Value::Str(String::new()),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(n) => write!(f, "str:{n}"),
            other => f.write_str(other.name()),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Typed values
// ------------------------------------------------------------------------------------------------

/// A dynamically-tagged value over the primitive type set.
///
/// The variant always matches the record's declared [`PrimitiveType`];
/// the engine never erases type information.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    F32(f32),
    I32(i32),
    U32(u32),
    F64(f64),
    I64(i64),
    U64(u64),
    Str(String),
}

impl Value {
    /// Name of this value's type, used in error context.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::F32(_) => "f32",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::F64(_) => "f64",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::Str(_) => "str",
        }
    }

    /// Ordering rank of the variant, mirroring the tag order.
    ///
    /// Only relevant when two values of different types meet in an
    /// ordered container; same-type comparisons never consult it.
    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0x01,
            Self::I8(_) => 0x02,
            Self::U8(_) => 0x03,
            Self::I16(_) => 0x04,
            Self::U16(_) => 0x05,
            Self::F32(_) => 0x08,
            Self::I32(_) => 0x09,
            Self::U32(_) => 0x0A,
            Self::F64(_) => 0x0C,
            Self::I64(_) => 0x0D,
            Self::U64(_) => 0x0E,
            Self::Str(_) => 0x10,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::I8(a), Self::I8(b)) => a.cmp(b),
            (Self::U8(a), Self::U8(b)) => a.cmp(b),
            (Self::I16(a), Self::I16(b)) => a.cmp(b),
            (Self::U16(a), Self::U16(b)) => a.cmp(b),
            (Self::F32(a), Self::F32(b)) => a.total_cmp(b),
            (Self::I32(a), Self::I32(b)) => a.cmp(b),
            (Self::U32(a), Self::U32(b)) => a.cmp(b),
            (Self::F64(a), Self::F64(b)) => a.total_cmp(b),
            (Self::I64(a), Self::I64(b)) => a.cmp(b),
            (Self::U64(a), Self::U64(b)) => a.cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Timestamp codec
// ------------------------------------------------------------------------------------------------

/// Encodes a millisecond timestamp as a little-endian IEEE-754 binary64.
///
/// Zero encodes to eight zero bytes.
pub fn encode_timestamp(millis: u64) -> [u8; 8] {
    (millis as f64).to_le_bytes()
}

/// Decodes a little-endian binary64 timestamp back into milliseconds.
///
/// Negative or non-finite bit patterns decode to zero; they cannot be
/// produced by [`encode_timestamp`].
pub fn decode_timestamp(bytes: [u8; 8]) -> u64 {
    let raw = f64::from_le_bytes(bytes);
    if raw.is_finite() && raw > 0.0 {
        raw as u64
    } else {
        0
    }
}

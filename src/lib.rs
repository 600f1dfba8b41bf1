//! # StratumDB
//!
//! An embeddable, single-node, **strongly-typed** key-value storage
//! engine built on a Log-Structured Merge (LSM) architecture. Keys and
//! values belong to a closed set of primitive types with fixed encoded
//! widths, which keeps every on-disk record the same size and makes
//! block arithmetic exact.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                       Engine                           │
//! │                                                        │
//! │  write:  WAL append ──► memtable (primary │ wait)      │
//! │                             │ threshold                │
//! │                             ▼                          │
//! │                     flush ──► SSTable files            │
//! │                                                        │
//! │  read:   memtable ──► tables newest-first:             │
//! │          bloom ──► sparse index ──► block cache ──►    │
//! │          bounded read ──► binary search                │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | The memtable ↔ table pipeline — open, put, get, delete, flush, recovery |
//! | [`memtable`] | Double-buffered in-memory write buffer with flush handoff |
//! | [`wal`] | Framed write-ahead log with torn-tail-tolerant replay |
//! | [`sstable`] | Immutable sorted table files with index, bloom, and cache sidekicks |
//! | [`record`] | Logical records and their two wire formats |
//! | [`index`] | Sparse index (`SortedArray`) and its sidecar codec |
//! | [`bloom`] | Bloom filter over a packed bit array, pluggable hashing |
//! | [`cache`] | LFU block cache |
//! | [`appender`] | Byte-threshold buffered append-only writer |
//! | [`types`] | Primitive type tags, typed values, little-endian codec |
//!
//! ## Key Properties
//!
//! - **WAL-first writes** — the log append is the commit point; replay
//!   reconstructs the exact pre-crash memtable, torn tails tolerated.
//! - **Typed records** — every record carries its key and value type
//!   tags, so decoders are total and widths never drift.
//! - **Three read accelerators** — per-table bloom filter, sparse index,
//!   and LFU block cache bound every point read to at most one block
//!   read plus an in-memory binary search.
//! - **Tombstone shadowing** — deletes write tombstones; the
//!   newest-first read order makes a later delete mask any older write.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stratumdb::engine::{Engine, EngineConfig};
//! use stratumdb::types::{PrimitiveType, Value};
//!
//! let config = EngineConfig {
//!     key_type: PrimitiveType::U64,
//!     value_type: PrimitiveType::Str(32),
//!     memtable_threshold: 500,
//!     ..EngineConfig::default()
//! };
//!
//! let mut engine = Engine::open("/tmp/my_db", config).unwrap();
//!
//! engine.put(Value::U64(7), Value::Str("hello".into())).unwrap();
//! assert_eq!(
//!     engine.get(&Value::U64(7)).unwrap(),
//!     Some(Value::Str("hello".into()))
//! );
//!
//! engine.delete(Value::U64(7)).unwrap();
//! assert_eq!(engine.get(&Value::U64(7)).unwrap(), None);
//!
//! engine.close().unwrap();
//! ```

pub mod appender;
pub mod bloom;
pub mod cache;
pub mod engine;
pub mod index;
pub mod memtable;
pub mod record;
pub mod sstable;
pub mod types;
pub mod wal;

//! Memtable Module
//!
//! The mutable, in-memory write buffer of the storage engine: an ordered
//! map from key to the latest [`DataNode`] for that key, backed by **two
//! buffers** so writes can continue while a flush is being prepared.
//!
//! ## Design Invariants
//!
//! - Writes land in `primary` until the flush threshold locks it; while
//!   locked, writes go to `wait` instead.
//! - At most one flush is in flight: the lock is set once, and cleared
//!   by the flush handoff.
//! - Reads consult `primary` first, then `wait`. A key present in both
//!   buffers resolves to `primary` — it was written before the lock and
//!   logically precedes anything in `wait`.
//! - The flush handoff is a single swap: `wait` becomes the new
//!   `primary`, a fresh empty `wait` is installed, and the outgoing
//!   buffer's records are returned in key order.
//!
//! ## Events
//!
//! The memtable reports two conditions through a tiny observer trait
//! (exactly one subscriber exists — the engine pipeline):
//!
//! - [`MemtableEvents::needs_flush`] — the threshold was reached and the
//!   primary buffer is now locked.
//! - [`MemtableEvents::buffer_opened`] — a flush handoff completed and
//!   writes flow into `primary` again.
//!
//! The memtable performs no I/O and produces no I/O errors; durability
//! is the write-ahead log's concern, ordering across flushes is the
//! engine's.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::record::DataNode;
use crate::types::Value;

// ------------------------------------------------------------------------------------------------
// Events
// ------------------------------------------------------------------------------------------------

/// Observer slots for the memtable's two events. All methods default to
/// no-ops so a subscriber only implements what it consumes.
pub trait MemtableEvents: Send + Sync {
    /// The flush threshold was reached; `primary` is locked.
    fn needs_flush(&self) {}

    /// A flush handoff completed; writes to `primary` may resume.
    fn buffer_opened(&self) {}
}

// ------------------------------------------------------------------------------------------------
// Stats
// ------------------------------------------------------------------------------------------------

/// Snapshot of memtable state returned by [`Memtable::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemtableStats {
    /// Records in the primary buffer.
    pub primary_len: usize,

    /// Records in the wait buffer.
    pub wait_len: usize,

    /// Whether the primary buffer is locked for flush.
    pub locked: bool,

    /// Configured flush threshold in records.
    pub threshold: usize,
}

// ------------------------------------------------------------------------------------------------
// Memtable
// ------------------------------------------------------------------------------------------------

/// Double-buffered ordered write buffer.
pub struct Memtable {
    /// Buffer receiving writes in the normal state.
    primary: BTreeMap<Value, DataNode>,

    /// Overflow buffer receiving writes while `primary` is locked.
    wait: BTreeMap<Value, DataNode>,

    /// Set when the threshold is reached; cleared by the flush handoff.
    locked: bool,

    /// Record count that triggers a flush.
    threshold: usize,

    /// The single event subscriber, when installed.
    observer: Option<Arc<dyn MemtableEvents>>,
}

impl Memtable {
    /// Creates an empty memtable that requests a flush at `threshold`
    /// records.
    pub fn new(threshold: usize) -> Self {
        Self {
            primary: BTreeMap::new(),
            wait: BTreeMap::new(),
            locked: false,
            threshold,
            observer: None,
        }
    }

    /// Installs the event subscriber.
    pub fn set_observer(&mut self, observer: Arc<dyn MemtableEvents>) {
        self.observer = Some(observer);
    }

    /// Inserts `node`, overwriting any previous record for its key in
    /// the receiving buffer.
    ///
    /// In the normal state the primary buffer receives the write and the
    /// threshold is checked; while locked, the wait buffer receives it.
    pub fn insert(&mut self, node: DataNode) {
        let key = node.key().clone();
        if self.locked {
            trace!(%key, "insert routed to wait buffer");
            self.wait.insert(key, node);
            return;
        }

        self.primary.insert(key, node);
        if self.primary.len() >= self.threshold {
            self.locked = true;
            debug!(records = self.primary.len(), "flush threshold reached, primary locked");
            if let Some(observer) = &self.observer {
                observer.needs_flush();
            }
        }
    }

    /// Latest record for `key`, primary buffer first.
    pub fn get(&self, key: &Value) -> Option<&DataNode> {
        self.primary.get(key).or_else(|| self.wait.get(key))
    }

    /// Whether any buffer holds a record for `key` (tombstones count).
    pub fn has(&self, key: &Value) -> bool {
        self.primary.contains_key(key) || self.wait.contains_key(key)
    }

    /// Snapshot of the logical contents in key order.
    ///
    /// A key present in both buffers resolves to its primary record.
    pub fn peek_all(&self) -> Vec<(Value, DataNode)> {
        let mut merged = self.wait.clone();
        for (key, node) in &self.primary {
            merged.insert(key.clone(), node.clone());
        }
        merged.into_iter().collect()
    }

    /// Flush handoff.
    ///
    /// Swaps `wait` into `primary`, installs a fresh `wait`, clears the
    /// lock, signals `buffer_opened`, and returns the outgoing buffer's
    /// records in ascending key order.
    pub fn flush(&mut self) -> Vec<DataNode> {
        let outgoing = std::mem::replace(&mut self.primary, std::mem::take(&mut self.wait));
        self.locked = false;
        debug!(records = outgoing.len(), carried = self.primary.len(), "flush handoff completed");
        if let Some(observer) = &self.observer {
            observer.buffer_opened();
        }
        outgoing.into_values().collect()
    }

    /// Drops both buffers and the lock.
    pub fn clear(&mut self) {
        self.primary.clear();
        self.wait.clear();
        self.locked = false;
    }

    /// Current buffer sizes and lock state.
    pub fn stats(&self) -> MemtableStats {
        MemtableStats {
            primary_len: self.primary.len(),
            wait_len: self.wait.len(),
            locked: self.locked,
            threshold: self.threshold,
        }
    }

    /// Whether the primary buffer is locked for flush.
    pub fn needs_flush(&self) -> bool {
        self.locked
    }

    /// Logical record count across both buffers.
    pub fn len(&self) -> usize {
        self.primary.len() + self.wait.len()
    }

    /// Whether both buffers are empty.
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.wait.is_empty()
    }
}

impl std::fmt::Debug for Memtable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memtable")
            .field("primary", &self.primary.len())
            .field("wait", &self.wait.len())
            .field("locked", &self.locked)
            .field("threshold", &self.threshold)
            .finish()
    }
}

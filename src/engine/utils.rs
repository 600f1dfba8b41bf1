//! Engine utilities.
//!
//! The engine itself is single-threaded; this module provides the small
//! synchronization helper offered to hosts that wrap it in threads.

use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

// ------------------------------------------------------------------------------------------------
// Reentrant lock
// ------------------------------------------------------------------------------------------------

/// Owner and nesting depth of the lock.
#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// A reentrant mutual-exclusion lock.
///
/// The thread holding the lock may acquire it again without
/// deadlocking; the lock is released when every nested guard has been
/// dropped. Offered to multithreaded hosts that serialize access to a
/// whole [`Engine`](crate::engine::Engine).
#[derive(Debug, Default)]
pub struct ReentrantLock {
    state: Mutex<LockState>,
    available: Condvar,
}

impl ReentrantLock {
    /// Creates an unlocked lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock, blocking until it is available.
    ///
    /// Reentrant: a thread that already holds the lock only deepens its
    /// nesting count.
    pub fn lock(&self) -> ReentrantGuard<'_> {
        let current = thread::current().id();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.owner == Some(current) {
            state.depth += 1;
        } else {
            while state.owner.is_some() {
                state = self
                    .available
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
            state.owner = Some(current);
            state.depth = 1;
        }
        ReentrantGuard { lock: self }
    }

    fn unlock(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            self.available.notify_one();
        }
    }
}

/// Guard returned by [`ReentrantLock::lock`]; releases one nesting
/// level on drop.
#[derive(Debug)]
pub struct ReentrantGuard<'a> {
    lock: &'a ReentrantLock,
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

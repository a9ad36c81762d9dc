//! Per-thread exclusive locks
//!
//! An entry lives only while someone holds or waits for its lock, so the
//! map stays as small as the set of busy threads.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
pub struct ThreadLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `thread_id`
    pub async fn acquire(&self, thread_id: &str) -> ThreadLease<'_> {
        let slot = self
            .slots
            .lock()
            .entry(thread_id.to_string())
            .or_default()
            .clone();
        ThreadLease {
            locks: self,
            thread_id: thread_id.to_string(),
            guard: Some(slot.lock_owned().await),
        }
    }

    /// Threads currently held or waited on
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held lock on one thread; released on drop
pub struct ThreadLease<'a> {
    locks: &'a ThreadLocks,
    thread_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadLease<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.locks.slots.lock();
        // the map's own reference is the last one: nobody is waiting
        if slots
            .get(&self.thread_id)
            .map_or(false, |slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.thread_id);
        }
    }
}

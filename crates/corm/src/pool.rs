//! Scratch buffer pool for statement compilation.
//!
//! Buffers are grouped by capacity class. A returned buffer is cleared before
//! it is stored; buffers above the retention ceiling are dropped instead, so
//! one huge statement cannot pin memory for the rest of the process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Capacity classes, smallest first.
const CLASS_SIZES: [usize; 5] = [256, 1024, 4096, 16 * 1024, 64 * 1024];

/// Default retention ceiling per buffer.
pub const DEFAULT_MAX_RETAINED_BYTES: usize = 64 * 1024;

/// Default number of idle buffers kept per class.
pub const DEFAULT_BUFFERS_PER_CLASS: usize = 32;

/// Scratch pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub discarded: u64,
    pub idle: usize,
}

/// Pool of reusable `String` buffers.
#[derive(Debug)]
pub struct ScratchPool {
    classes: [Mutex<Vec<String>>; CLASS_SIZES.len()],
    max_retained: usize,
    per_class: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    discarded: AtomicU64,
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETAINED_BYTES, DEFAULT_BUFFERS_PER_CLASS)
    }
}

impl ScratchPool {
    pub fn new(max_retained: usize, per_class: usize) -> Self {
        Self {
            classes: Default::default(),
            max_retained,
            per_class,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    /// Take an empty buffer with at least `capacity_hint` bytes of capacity.
    pub fn get(&self, capacity_hint: usize) -> String {
        let start = CLASS_SIZES
            .iter()
            .position(|size| *size >= capacity_hint)
            .unwrap_or(CLASS_SIZES.len());

        for class in &self.classes[start..] {
            let mut idle = class.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(buf) = idle.pop() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return buf;
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        String::with_capacity(capacity_hint.max(CLASS_SIZES[0]))
    }

    /// Return a buffer. It is cleared, or dropped if oversized or the class is full.
    pub fn put(&self, mut buf: String) {
        let cap = buf.capacity();
        if cap > self.max_retained || cap == 0 {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        buf.clear();

        let class = CLASS_SIZES
            .iter()
            .rposition(|size| *size <= cap)
            .unwrap_or(0);
        let mut idle = self.classes[class]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if idle.len() >= self.per_class {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        idle.push(buf);
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self
            .classes
            .iter()
            .map(|c| c.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum();
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle,
        }
    }
}

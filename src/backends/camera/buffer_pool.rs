// SPDX-License-Identifier: GPL-3.0-only

//! Bounded pool of frame buffers
//!
//! A source owns a fixed number of buffer slots. Every captured frame holds
//! one slot until the consumer releases it; a source that finds no free
//! slot drops the capture instead of allocating more. Released buffers are
//! kept for reuse so steady-state capture does not allocate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

struct PoolInner {
    /// Returned allocations waiting to be reused
    free: Mutex<Vec<Vec<u8>>>,
    /// Slots currently held by frames
    outstanding: AtomicUsize,
    /// Maximum slots
    capacity: usize,
}

/// Fixed-capacity frame buffer pool, cheap to clone
#[derive(Clone)]
pub struct FramePool {
    inner: Arc<PoolInner>,
}

impl FramePool {
    /// Create a pool with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(capacity)),
                outstanding: AtomicUsize::new(0),
                capacity,
            }),
        }
    }

    /// Reserve a slot and get a zeroed buffer of `len` bytes
    ///
    /// Returns `None` when every slot is held by an unreleased frame.
    pub fn try_acquire(&self, len: usize) -> Option<PooledBuffer> {
        let mut current = self.inner.outstanding.load(Ordering::Acquire);
        loop {
            if current >= self.inner.capacity {
                return None;
            }
            match self.inner.outstanding.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let mut data = self
            .inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        data.clear();
        data.resize(len, 0);

        Some(PooledBuffer {
            data,
            pool: Arc::clone(&self.inner),
        })
    }

    /// Number of slots currently held
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl std::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePool")
            .field("outstanding", &self.outstanding())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// A buffer holding one pool slot; the slot is freed when this is dropped
pub struct PooledBuffer {
    data: Vec<u8>,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    /// Mutable access for the source filling the buffer
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PooledBuffer({} bytes)", self.data.len())
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        {
            let mut free = self.pool.free.lock().unwrap_or_else(PoisonError::into_inner);
            if free.len() < self.pool.capacity {
                free.push(data);
            }
        }
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

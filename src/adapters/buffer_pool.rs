use std::sync::{Mutex, PoisonError};

use crate::ports::{BufferSource, DEFAULT_BUFFER_SIZE};

/// Keeps up to `capacity` released buffers around for the next sessions.
pub struct PooledBufferSource {
    size: usize,
    capacity: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl PooledBufferSource {
    pub fn new(size: usize, capacity: usize) -> Self {
        Self {
            size,
            capacity,
            free: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, capacity)
    }

    /// Buffers currently waiting for reuse
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl BufferSource for PooledBufferSource {
    fn get(&self) -> Vec<u8> {
        let reused = self.free.lock().unwrap_or_else(PoisonError::into_inner).pop();
        reused.unwrap_or_else(|| vec![0; self.size])
    }

    fn put(&self, buf: Vec<u8>) {
        // Foreign sizes would break the fixed-size contract of `get`.
        if buf.len() != self.size {
            return;
        }

        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.capacity {
            free.push(buf);
        }
    }
}

//! Reusable byte buffers for batch handlers.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Buffers that grew past this multiple of the nominal size are dropped on
/// release instead of being pooled.
const MAX_GROWTH: usize = 4;

/// A pool of `Vec<u8>` scratch buffers.
///
/// [`BufferPool::acquire`] hands out a guard that returns its buffer when
/// dropped, including during unwinding.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    buffer_size: usize,
    max_pooled: usize,
    outstanding: AtomicUsize,
    allocated: AtomicUsize,
}

impl BufferPool {
    pub fn new(buffer_size: usize) -> Self {
        Self::with_capacity(buffer_size, 64)
    }

    /// Pool keeping at most `max_pooled` idle buffers.
    pub fn with_capacity(buffer_size: usize, max_pooled: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            buffer_size,
            max_pooled,
            outstanding: AtomicUsize::new(0),
            allocated: AtomicUsize::new(0),
        }
    }

    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self.buffers.lock().pop().unwrap_or_else(|| {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            Vec::with_capacity(self.buffer_size)
        });
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        PooledBuffer { pool: self, buf }
    }

    fn release(&self, mut buf: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        if buf.capacity() > self.buffer_size.saturating_mul(MAX_GROWTH) {
            return;
        }
        buf.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_pooled {
            buffers.push(buf);
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Buffers currently held by guards.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Idle buffers ready for reuse.
    pub fn available(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Buffers allocated over the pool's lifetime.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_are_reused() {
        let pool = BufferPool::new(128);
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"hello");
            assert_eq!(pool.outstanding(), 1);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.available(), 1);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 128);
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn test_oversized_buffers_are_dropped() {
        let pool = BufferPool::new(8);
        {
            let mut buf = pool.acquire();
            buf.resize(1024, 0);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_idle_buffers_are_capped() {
        let pool = BufferPool::with_capacity(16, 1);
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.allocated(), 2);
    }
}

//! Byte-accurate memory accounting for engine-owned buffers.
//!
//! The probe engine borrows a [`MemoryPool`] from the surrounding operator and
//! charges every scratch buffer against it: the two output index buffers at
//! construction and the probe index buffer as it grows. Reservations release
//! their bytes on drop, so an engine that errors out still returns its budget.

use crate::error::{VjxError, VjxResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared byte budget for one operator tree.
///
/// Reservations are tracked with a single atomic counter. The pool never
/// allocates anything itself; it only answers "may I hold this many bytes".
#[derive(Debug)]
pub struct MemoryPool {
    limit: usize,
    used: AtomicUsize,
}

impl MemoryPool {
    /// Create a pool with a hard byte limit.
    pub fn with_limit(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit,
            used: AtomicUsize::new(0),
        })
    }

    /// Create a pool that never refuses a request.
    pub fn unbounded() -> Arc<Self> {
        Self::with_limit(usize::MAX)
    }

    /// Bytes currently reserved across all holders.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    /// Reserve `bytes`, failing with [`VjxError::OutOfMemory`] if the limit
    /// would be exceeded.
    pub fn try_reserve(self: &Arc<Self>, bytes: usize) -> VjxResult<MemoryReservation> {
        self.charge(bytes)?;
        Ok(MemoryReservation {
            pool: Arc::clone(self),
            bytes,
        })
    }

    fn charge(&self, bytes: usize) -> VjxResult<()> {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let available = self.limit.saturating_sub(current);
            if bytes > available {
                return Err(VjxError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
            match self.used.compare_exchange_weak(
                current,
                current + bytes,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::Relaxed);
    }
}

/// RAII handle for bytes reserved from a [`MemoryPool`].
#[derive(Debug)]
pub struct MemoryReservation {
    pool: Arc<MemoryPool>,
    bytes: usize,
}

impl MemoryReservation {
    /// Bytes held by this reservation.
    pub fn size(&self) -> usize {
        self.bytes
    }

    /// Grow or shrink the reservation to `new_bytes`.
    pub fn try_resize(&mut self, new_bytes: usize) -> VjxResult<()> {
        if new_bytes > self.bytes {
            self.pool.charge(new_bytes - self.bytes)?;
        } else {
            self.pool.release(self.bytes - new_bytes);
        }
        self.bytes = new_bytes;
        Ok(())
    }
}

impl Drop for MemoryReservation {
    fn drop(&mut self) {
        self.pool.release(self.bytes);
    }
}

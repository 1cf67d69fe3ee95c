//! Composite-index buffers: the `starts` and `links` chain tables.
//!
//! Both tables, and the engine's output offset buffer, share one cell layout:
//! 6 bytes per record, 4 little-endian bytes of build-batch index followed by
//! 2 little-endian bytes of row offset. An all-ones cell is the stored form
//! of [`NULL_COMPOSITE`](crate::join::types::NULL_COMPOSITE).
//!
//! `starts[slot_batch][slot_offset]` holds the first composite index of the
//! chain for a hash slot; `links[batch][row]` holds the next composite index
//! after build row `(batch, row)`. Chains are acyclic by the build-side
//! contract and traversed read-only during probing.

use crate::join::types::{BUILD_RECORD_LINK_SIZE, CBI_LOW_MASK, NULL_COMPOSITE, composite};

/// Flat buffer of 6-byte composite-index cells.
///
/// Cell reads and writes are bounds-checked by the underlying slice; callers
/// validate record indices against their own row counts before descending
/// here, so an out-of-range access is a bug, not an error path.
#[derive(Debug, Clone)]
pub struct CompositeBuffer {
    data: Vec<u8>,
    records: usize,
}

impl CompositeBuffer {
    /// Buffer of `records` cells, every cell initialized to the sentinel.
    pub fn with_records(records: usize) -> Self {
        Self {
            data: vec![0xFF; records * BUILD_RECORD_LINK_SIZE],
            records,
        }
    }

    /// Number of 6-byte cells.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Buffer footprint in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Decode cell `idx` into a register-width composite index.
    #[inline]
    pub fn get(&self, idx: usize) -> i64 {
        let off = idx * BUILD_RECORD_LINK_SIZE;
        let d = &self.data;
        let batch = u32::from_le_bytes([d[off], d[off + 1], d[off + 2], d[off + 3]]);
        let row = u16::from_le_bytes([d[off + 4], d[off + 5]]);
        if batch == u32::MAX && row == u16::MAX {
            NULL_COMPOSITE
        } else {
            composite(batch, row)
        }
    }

    /// Encode `value` (a composite index or [`NULL_COMPOSITE`]) into cell
    /// `idx`.
    #[inline]
    pub fn set(&mut self, idx: usize, value: i64) {
        let off = idx * BUILD_RECORD_LINK_SIZE;
        let batch = (value >> 16) as u32;
        let row = (value & CBI_LOW_MASK) as u16;
        self.data[off..off + 4].copy_from_slice(&batch.to_le_bytes());
        self.data[off + 4..off + 6].copy_from_slice(&row.to_le_bytes());
    }
}

//! Hash-table adapter for probe lookups.
//!
//! The probe engine sees exactly one operation: [`JoinLookup::find`], which
//! writes a 32-bit hash slot id (or [`NOT_FOUND`]) per probe row. Key
//! encoding and the null-key policy live behind this trait and never leak
//! into the probe loop.
//!
//! A slot id addresses the chain-start tables: its upper 16 bits select a
//! starts buffer, its lower 16 bits a cell within it.

use crate::error::{VjxError, VjxResult};
use crate::join::types::NOT_FOUND;
use ahash::AHashMap;
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

/// Probe-side lookup over a prebuilt hash table.
pub trait JoinLookup: Send + Sync {
    /// Write one hash slot id per probe row into `out[..probe.num_rows()]`.
    ///
    /// `NOT_FOUND` marks rows whose key has no chain on the build side.
    fn find(&self, probe: &RecordBatch, out: &mut [i32]) -> VjxResult<()>;
}

/// Hash table mapping encoded key bytes to a chain-start slot.
///
/// Produced by [`BuildSideBuilder::finish`](crate::join::BuildSideBuilder);
/// the slot values index the `starts` tables handed to the probe engine
/// alongside it.
pub struct JoinHashTable {
    slots: AHashMap<Vec<u8>, i32>,
    key_columns: Vec<usize>,
    null_equals_null: bool,
}

impl JoinHashTable {
    pub(crate) fn new(
        slots: AHashMap<Vec<u8>, i32>,
        key_columns: Vec<usize>,
        null_equals_null: bool,
    ) -> Self {
        Self {
            slots,
            key_columns,
            null_equals_null,
        }
    }

    /// Number of distinct keys on the build side.
    pub fn distinct_keys(&self) -> usize {
        self.slots.len()
    }
}

impl JoinLookup for JoinHashTable {
    fn find(&self, probe: &RecordBatch, out: &mut [i32]) -> VjxResult<()> {
        let rows = probe.num_rows();
        if out.len() < rows {
            return Err(VjxError::Invariant(format!(
                "probe index buffer holds {} slots for {rows} probe rows",
                out.len()
            )));
        }
        let mut key = Vec::with_capacity(16);
        for (row, slot) in out.iter_mut().enumerate().take(rows) {
            key.clear();
            let has_null = encode_key_into(probe, &self.key_columns, row, &mut key)?;
            *slot = if has_null && !self.null_equals_null {
                NOT_FOUND
            } else {
                self.slots.get(&key).copied().unwrap_or(NOT_FOUND)
            };
        }
        Ok(())
    }
}

/// Append the encoded key for one row to `key`, returning whether any key
/// column was null at that row.
///
/// Each column contributes a null/non-null marker byte followed by a
/// type-tagged little-endian payload, so `Int32(1)` and `Int64(1)` encode
/// differently and variable-length values cannot alias across columns.
pub(crate) fn encode_key_into(
    batch: &RecordBatch,
    key_columns: &[usize],
    row: usize,
    key: &mut Vec<u8>,
) -> VjxResult<bool> {
    let mut has_null = false;
    for &col_idx in key_columns {
        let col = batch.column(col_idx);
        if col.is_null(row) {
            key.push(0);
            has_null = true;
        } else {
            key.push(1);
            append_value(key, col, row)?;
        }
    }
    Ok(has_null)
}

/// Owned-key variant used by the parallel build path.
pub(crate) fn encode_key(
    batch: &RecordBatch,
    key_columns: &[usize],
    row: usize,
) -> VjxResult<(Vec<u8>, bool)> {
    let mut key = Vec::with_capacity(16);
    let has_null = encode_key_into(batch, key_columns, row, &mut key)?;
    Ok((key, has_null))
}

fn append_value(key: &mut Vec<u8>, col: &ArrayRef, row: usize) -> VjxResult<()> {
    match col.data_type() {
        DataType::Boolean => {
            key.push(col.as_boolean().value(row) as u8);
        }
        DataType::Int32 => {
            let v = col.as_primitive::<arrow::datatypes::Int32Type>().value(row);
            key.extend_from_slice(&v.to_le_bytes());
        }
        DataType::Int64 => {
            let v = col.as_primitive::<arrow::datatypes::Int64Type>().value(row);
            key.extend_from_slice(&v.to_le_bytes());
        }
        DataType::Float64 => {
            let v = col.as_primitive::<arrow::datatypes::Float64Type>().value(row);
            key.extend_from_slice(&v.to_le_bytes());
        }
        DataType::Utf8 => {
            let s = col.as_string::<i32>().value(row);
            key.extend_from_slice(&(s.len() as u32).to_le_bytes());
            key.extend_from_slice(s.as_bytes());
        }
        dt => {
            return Err(VjxError::KeyTypeNotSupported(format!("{dt:?}")));
        }
    }
    Ok(())
}

//! Build-side construction: batches, chain tables, match bitmaps.
//!
//! Feeds build batches (each at most [`BATCH_SIZE`] rows) into the hash
//! table and chain tables the probe engine traverses. Rows sharing a key are
//! linked newest-first: inserting prepends the row to its slot's chain.
//! No partitioning, spill, or rehash — the build side is immutable once
//! [`BuildSideBuilder::finish`] runs.

use crate::error::{VjxError, VjxResult};
use crate::join::bitmap::MatchBitmap;
use crate::join::chain::CompositeBuffer;
use crate::join::hash_table::{JoinHashTable, encode_key, encode_key_into};
use crate::join::types::{BATCH_SIZE, JoinConfig, composite};
use crate::logging::BUILD_TARGET;
use ahash::AHashMap;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;
use tracing::debug;

/// Per-build-batch state consumed by the probe engine.
#[derive(Debug)]
pub struct BuildInfo {
    /// Next-in-chain composite index per row of this batch.
    pub links: CompositeBuffer,
    /// One bit per row, set when the row first joins an output match.
    pub matches: MatchBitmap,
    /// Populated rows in this batch.
    pub record_count: usize,
}

/// The immutable build side of one hash join.
#[derive(Debug)]
pub struct BuildSide {
    pub schema: SchemaRef,
    /// Build batches in insertion order; composite indices address into
    /// these.
    pub batches: Vec<RecordBatch>,
    /// Chain-start tables, indexed by the upper 16 bits of a hash slot id.
    pub starts: Vec<CompositeBuffer>,
    /// Per-batch links, bitmaps, and row counts, parallel to `batches`.
    pub infos: Vec<BuildInfo>,
}

impl BuildSide {
    /// An empty build side with the given schema. LEFT/FULL probes against
    /// it null-project every build column; INNER/RIGHT produce nothing.
    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
            starts: Vec::new(),
            infos: Vec::new(),
        }
    }

    /// Total populated rows across all build batches.
    pub fn total_rows(&self) -> usize {
        self.infos.iter().map(|i| i.record_count).sum()
    }
}

/// Incremental constructor for a [`BuildSide`] and its [`JoinHashTable`].
pub struct BuildSideBuilder {
    schema: SchemaRef,
    key_columns: Vec<usize>,
    parallel_threshold: usize,
    slots: AHashMap<Vec<u8>, i32>,
    next_slot: i32,
    batches: Vec<RecordBatch>,
    starts: Vec<CompositeBuffer>,
    infos: Vec<BuildInfo>,
}

impl BuildSideBuilder {
    /// `key_columns` are build-side column indices, in join-key order.
    pub fn new(schema: SchemaRef, key_columns: Vec<usize>, config: &JoinConfig) -> Self {
        Self {
            schema,
            key_columns,
            parallel_threshold: config.parallel_build_threshold,
            slots: AHashMap::new(),
            next_slot: 0,
            batches: Vec::new(),
            starts: Vec::new(),
            infos: Vec::new(),
        }
    }

    /// Insert one build batch. Batches larger than [`BATCH_SIZE`] must be
    /// sliced by the caller; empty batches are dropped.
    pub fn push_batch(&mut self, batch: RecordBatch) -> VjxResult<()> {
        let rows = batch.num_rows();
        if rows == 0 {
            return Ok(());
        }
        if rows > BATCH_SIZE {
            return Err(VjxError::Invariant(format!(
                "build batch has {rows} rows, capacity is {BATCH_SIZE}"
            )));
        }
        if batch.schema() != self.schema {
            return Err(VjxError::Schema(format!(
                "build batch schema {:?} does not match build side schema {:?}",
                batch.schema(),
                self.schema
            )));
        }

        let batch_idx = u32::try_from(self.batches.len())
            .map_err(|_| VjxError::Invariant("build batch count exceeds u32 range".to_string()))?;

        // Key extraction is the expensive part; hash large batches with
        // rayon and keep slot assignment sequential so chain order stays
        // deterministic.
        let keys: Vec<Vec<u8>> = if rows >= self.parallel_threshold {
            (0..rows)
                .into_par_iter()
                .map(|row| encode_key(&batch, &self.key_columns, row).map(|(key, _)| key))
                .collect::<VjxResult<_>>()?
        } else {
            let mut keys = Vec::with_capacity(rows);
            let mut key = Vec::with_capacity(16);
            for row in 0..rows {
                key.clear();
                encode_key_into(&batch, &self.key_columns, row, &mut key)?;
                keys.push(key.clone());
            }
            keys
        };

        let mut links = CompositeBuffer::with_records(rows);
        for (row, key) in keys.into_iter().enumerate() {
            let slot = match self.slots.get(&key) {
                Some(&slot) => slot,
                None => {
                    let slot = self.allocate_slot()?;
                    self.slots.insert(key, slot);
                    slot
                }
            };
            let slot_batch = (slot >> 16) as usize;
            let slot_offset = (slot & 0xFFFF) as usize;
            // Prepend: the new row becomes the chain head, pointing at the
            // previous head (or the end-of-chain sentinel).
            links.set(row, self.starts[slot_batch].get(slot_offset));
            self.starts[slot_batch].set(slot_offset, composite(batch_idx, row as u16));
        }

        self.infos.push(BuildInfo {
            links,
            matches: MatchBitmap::new(rows),
            record_count: rows,
        });
        self.batches.push(batch);
        Ok(())
    }

    fn allocate_slot(&mut self) -> VjxResult<i32> {
        let slot = self.next_slot;
        self.next_slot = self
            .next_slot
            .checked_add(1)
            .ok_or_else(|| VjxError::Invariant("hash slot space exhausted".to_string()))?;
        let slot_batch = (slot >> 16) as usize;
        if slot_batch == self.starts.len() {
            self.starts.push(CompositeBuffer::with_records(BATCH_SIZE));
        }
        Ok(slot)
    }

    /// Finish construction. `probe_key_columns` are the probe-side columns
    /// the lookup will encode, in the same join-key order as the build keys.
    pub fn finish(
        self,
        probe_key_columns: Vec<usize>,
        null_equals_null: bool,
    ) -> (BuildSide, JoinHashTable) {
        debug!(
            target: BUILD_TARGET,
            batches = self.batches.len(),
            rows = self.infos.iter().map(|i| i.record_count).sum::<usize>(),
            distinct_keys = self.slots.len(),
            "build side complete"
        );
        let side = BuildSide {
            schema: self.schema,
            batches: self.batches,
            starts: self.starts,
            infos: self.infos,
        };
        let table = JoinHashTable::new(self.slots, probe_key_columns, null_equals_null);
        (side, table)
    }
}

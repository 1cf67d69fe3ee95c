//! The vectorized probe engine — the join operator's inner loop.
//!
//! One engine instance serves one join. The driver feeds probe batches
//! through [`ProbeEngine::probe_batch`], which emits output batches capped at
//! the configured target size and reports through a signed count whether the
//! probe batch is exhausted:
//!
//! - `k >= 0`: `k` rows emitted, probe batch fully consumed, fetch the next
//!   one.
//! - `-k`: `k` rows emitted, output batch filled mid-probe; call again with
//!   the *same* batch to resume.
//!
//! Suspension state is two cursors: the next unprocessed probe row and, when
//! the cut landed inside a build chain, the next composite index to emit.
//! Once the probe side is exhausted, RIGHT/FULL joins drain the rows whose
//! match bit never got set through
//! [`ProbeEngine::project_build_non_matches`], with the same signed-count
//! protocol.
//!
//! The engine owns three scratch buffers, all charged to the operator's
//! memory pool: the probe index buffer (one slot id per probe row, grown to
//! the largest probe batch seen and reused), the 16-bit probe selection
//! vector, and the 6-byte build offset buffer.

use crate::error::{VjxError, VjxResult};
use crate::join::build::BuildSide;
use crate::join::copier::{BuildCopier, ProbeCopier};
use crate::join::hash_table::JoinLookup;
use crate::join::types::{
    BATCH_SIZE, JoinConfig, JoinType, NOT_FOUND, NULL_COMPOSITE, SKIP, composite,
    composite_batch, composite_row,
};
use crate::join::chain::CompositeBuffer;
use crate::logging::PROBE_TARGET;
use crate::memory::{MemoryPool, MemoryReservation};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Nanosecond accumulators for the engine's four timed regions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProbeMetrics {
    /// Time spent in hash-table lookups.
    pub probe_find_ns: u64,
    /// Time spent materializing probe-side columns.
    pub probe_copy_ns: u64,
    /// Time spent materializing build-side columns.
    pub build_copy_ns: u64,
    /// Time spent in the unmatched-build phase.
    pub non_match_ns: u64,
}

/// Output schema of a join: projected build fields followed by projected
/// probe fields, with nullability widened on whichever side the join type
/// can null-project.
pub fn join_output_schema(
    build_schema: &SchemaRef,
    probe_schema: &SchemaRef,
    build_projection: &[usize],
    probe_projection: &[usize],
    join_type: JoinType,
) -> VjxResult<SchemaRef> {
    let build = BuildCopier::new(
        build_schema,
        build_projection,
        join_type.projects_unmatched_probe(),
        false,
    )?;
    let probe = ProbeCopier::new(
        probe_schema,
        probe_projection,
        join_type.projects_unmatched_build(),
    )?;
    let fields: Vec<Field> = build
        .fields()
        .iter()
        .chain(probe.fields())
        .map(|f| f.as_ref().clone())
        .collect();
    Ok(Arc::new(Schema::new(fields)))
}

/// The probe-phase state machine over a prebuilt hash join.
pub struct ProbeEngine {
    join_type: JoinType,
    batch_size: usize,
    lookup: Arc<dyn JoinLookup>,
    build: BuildSide,
    probe_copier: ProbeCopier,
    build_copier: BuildCopier,
    schema: SchemaRef,

    /// Probe index buffer: one hash slot id per row of the current probe
    /// batch.
    probed: Vec<i32>,
    /// Probe selection vector: probe-row index per output position.
    probe_sv2: Vec<u16>,
    /// Build offset buffer: composite index (or `SKIP`) per output position.
    build_offsets: CompositeBuffer,
    output_records: usize,

    /// Next unprocessed probe row; 0 with a null remainder means a fresh
    /// batch starts on the next call.
    next_probe_index: usize,
    /// Mid-chain resumption point: the next composite index to emit for the
    /// probe row at `next_probe_index`, or the null sentinel.
    remainder_composite: i64,
    /// Row count of the batch being resumed, for contract checking.
    current_probe_rows: usize,

    /// Unmatched-build scan cursors: next bitmap and next bit position.
    non_match_set: usize,
    non_match_elem: usize,

    pending: Option<RecordBatch>,
    index_reservation: Option<MemoryReservation>,
    pib_reservation: Option<MemoryReservation>,
    pool: Arc<MemoryPool>,
    metrics: ProbeMetrics,
    closed: bool,
}

impl ProbeEngine {
    /// Create an engine over a finished build side.
    ///
    /// The two output index buffers are reserved here; the probe index
    /// buffer is charged lazily as probe batches arrive.
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        pool: &Arc<MemoryPool>,
        join_type: JoinType,
        build: BuildSide,
        lookup: Arc<dyn JoinLookup>,
        probe_schema: &SchemaRef,
        build_projection: &[usize],
        probe_projection: &[usize],
        config: &JoinConfig,
    ) -> VjxResult<Self> {
        let batch_size = config.output_batch_size;
        if batch_size == 0 || batch_size > BATCH_SIZE {
            return Err(VjxError::Invariant(format!(
                "output batch size {batch_size} outside 1..={BATCH_SIZE}"
            )));
        }

        let build_copier = BuildCopier::new(
            &build.schema,
            build_projection,
            join_type.projects_unmatched_probe(),
            false,
        )?;
        let probe_copier = ProbeCopier::new(
            probe_schema,
            probe_projection,
            join_type.projects_unmatched_build(),
        )?;
        let fields: Vec<Field> = build_copier
            .fields()
            .iter()
            .chain(probe_copier.fields())
            .map(|f| f.as_ref().clone())
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let build_offsets = CompositeBuffer::with_records(batch_size);
        let index_bytes = batch_size * std::mem::size_of::<u16>() + build_offsets.byte_len();
        let index_reservation = pool.try_reserve(index_bytes)?;
        let pib_reservation = pool.try_reserve(0)?;

        Ok(Self {
            join_type,
            batch_size,
            lookup,
            build,
            probe_copier,
            build_copier,
            schema,
            probed: Vec::new(),
            probe_sv2: vec![0; batch_size],
            build_offsets,
            output_records: 0,
            next_probe_index: 0,
            remainder_composite: NULL_COMPOSITE,
            current_probe_rows: 0,
            non_match_set: 0,
            non_match_elem: 0,
            pending: None,
            index_reservation: Some(index_reservation),
            pib_reservation: Some(pib_reservation),
            pool: Arc::clone(pool),
            metrics: ProbeMetrics::default(),
            closed: false,
        })
    }

    /// Output schema: projected build fields then projected probe fields.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Snapshot of the engine's timing accumulators.
    pub fn metrics(&self) -> ProbeMetrics {
        self.metrics
    }

    /// Whether the engine is mid-way through a probe batch.
    pub fn is_suspended(&self) -> bool {
        self.next_probe_index != 0 || self.remainder_composite != NULL_COMPOSITE
    }

    /// The output batch assembled by the last `probe_batch` /
    /// `project_build_non_matches` call.
    pub fn take_output(&mut self) -> Option<RecordBatch> {
        self.pending.take()
    }

    /// Probe-row indices emitted by the last call, for drivers that consume
    /// raw indices instead of materialized output.
    pub fn emitted_probe_rows(&self) -> &[u16] {
        &self.probe_sv2[..self.output_records]
    }

    /// Composite build indices (or [`SKIP`]) emitted by the last call.
    pub fn emitted_build_rows(&self) -> Vec<i64> {
        (0..self.output_records)
            .map(|i| self.build_offsets.get(i))
            .collect()
    }

    /// Run the probe loop over `probe`, emitting at most the configured
    /// batch size of output rows.
    ///
    /// On the first call for a batch the hash lookup runs over all rows; a
    /// resumed call (previous return was negative) must pass the same batch.
    pub fn probe_batch(&mut self, probe: &RecordBatch) -> VjxResult<i32> {
        self.ensure_open("probe_batch")?;
        let rows = probe.num_rows();
        if rows > BATCH_SIZE {
            return Err(VjxError::Invariant(format!(
                "probe batch has {rows} rows, capacity is {BATCH_SIZE}"
            )));
        }

        if self.is_suspended() {
            if rows != self.current_probe_rows {
                return Err(VjxError::Invariant(format!(
                    "resumed probe batch has {rows} rows, suspended batch had {}",
                    self.current_probe_rows
                )));
            }
        } else {
            self.current_probe_rows = rows;
            self.grow_probe_index_buffer(rows)?;
            let started = Instant::now();
            let (lookup, probed) = (&self.lookup, &mut self.probed);
            lookup.find(probe, &mut probed[..rows])?;
            self.metrics.probe_find_ns += started.elapsed().as_nanos() as u64;
        }

        let projects_probe = self.join_type.projects_unmatched_probe();
        let projects_build = self.join_type.projects_unmatched_build();
        let mut cursor = self.next_probe_index;
        let mut remainder = self.remainder_composite;
        self.output_records = 0;

        while self.output_records < self.batch_size {
            if remainder == NULL_COMPOSITE {
                if cursor >= rows {
                    break;
                }
                let slot = self.probed[cursor];
                if slot == NOT_FOUND {
                    if projects_probe {
                        self.probe_sv2[self.output_records] = cursor as u16;
                        self.build_offsets.set(self.output_records, SKIP);
                        self.output_records += 1;
                    }
                    cursor += 1;
                    continue;
                }
                let slot_batch = (slot >> 16) as usize;
                let slot_offset = (slot & 0xFFFF) as usize;
                let starts = self.build.starts.get(slot_batch).ok_or_else(|| {
                    VjxError::Invariant(format!(
                        "hash slot {slot} references starts table {slot_batch} of {}",
                        self.build.starts.len()
                    ))
                })?;
                let head = starts.get(slot_offset);
                if head == NULL_COMPOSITE {
                    return Err(VjxError::Invariant(format!(
                        "hash slot {slot} resolves to an empty chain"
                    )));
                }
                remainder = head;
            } else {
                let batch = composite_batch(remainder);
                let row = composite_row(remainder);
                let info_count = self.build.infos.len();
                let info = self.build.infos.get_mut(batch).ok_or_else(|| {
                    VjxError::Invariant(format!(
                        "chain reached build batch {batch} of {info_count}"
                    ))
                })?;
                if row >= info.record_count {
                    return Err(VjxError::Invariant(format!(
                        "chain reached row {row} of build batch {batch} holding {} records",
                        info.record_count
                    )));
                }
                // The bit goes up before the output row is written; it is
                // never cleared during probing.
                if projects_build {
                    info.matches.set(row);
                }
                self.probe_sv2[self.output_records] = cursor as u16;
                self.build_offsets.set(self.output_records, remainder);
                self.output_records += 1;

                let next = info.links.get(row);
                if next == NULL_COMPOSITE {
                    remainder = NULL_COMPOSITE;
                    cursor += 1;
                } else {
                    remainder = next;
                }
            }
        }

        self.emit(probe)?;

        let consumed = cursor >= rows && remainder == NULL_COMPOSITE;
        if consumed {
            self.next_probe_index = 0;
            self.remainder_composite = NULL_COMPOSITE;
            Ok(self.output_records as i32)
        } else {
            trace!(
                target: PROBE_TARGET,
                emitted = self.output_records,
                probe_row = cursor,
                mid_chain = remainder != NULL_COMPOSITE,
                "output batch full, probe suspended"
            );
            self.next_probe_index = cursor;
            self.remainder_composite = remainder;
            Ok(-(self.output_records as i32))
        }
    }

    /// Terminal phase for RIGHT/FULL joins: emit build rows whose match bit
    /// never got set, probe columns all-null.
    ///
    /// Returns the emitted count, negated while unmatched rows remain.
    pub fn project_build_non_matches(&mut self) -> VjxResult<i32> {
        self.ensure_open("project_build_non_matches")?;
        if !self.join_type.projects_unmatched_build() {
            return Err(VjxError::InvalidOperation {
                message: format!("{} join does not project unmatched build rows", self.join_type),
                context: "project_build_non_matches".to_string(),
            });
        }

        let started = Instant::now();
        self.output_records = 0;
        let mut set = self.non_match_set;
        let mut elem = self.non_match_elem;
        let exhausted = loop {
            if self.output_records == self.batch_size {
                break false;
            }
            if set >= self.build.infos.len() {
                break true;
            }
            let info = &self.build.infos[set];
            let next = info.matches.next_clear_bit(elem);
            if next >= info.record_count {
                set += 1;
                elem = 0;
                continue;
            }
            self.build_offsets
                .set(self.output_records, composite(set as u32, next as u16));
            self.output_records += 1;
            elem = next + 1;
        };
        self.non_match_set = set;
        self.non_match_elem = elem;

        let probe_arrays = self.probe_copier.allocate(self.output_records);
        let build_arrays =
            self.build_copier
                .copy(&self.build.batches, &self.build_offsets, self.output_records)?;
        self.install_output(build_arrays, probe_arrays)?;
        self.metrics.non_match_ns += started.elapsed().as_nanos() as u64;

        if exhausted {
            debug!(
                target: PROBE_TARGET,
                emitted = self.output_records,
                "unmatched build scan complete"
            );
            Ok(self.output_records as i32)
        } else {
            Ok(-(self.output_records as i32))
        }
    }

    /// Release all engine-owned buffers. A second close is an error; no
    /// buffer is released twice.
    pub fn close(&mut self) -> VjxResult<()> {
        if self.closed {
            return Err(VjxError::InvalidOperation {
                message: "engine closed twice".to_string(),
                context: "close".to_string(),
            });
        }
        self.closed = true;
        self.probed = Vec::new();
        self.probe_sv2 = Vec::new();
        self.build_offsets = CompositeBuffer::with_records(0);
        self.output_records = 0;
        self.pending = None;
        self.index_reservation = None;
        self.pib_reservation = None;
        Ok(())
    }

    fn ensure_open(&self, operation: &str) -> VjxResult<()> {
        if self.closed {
            return Err(VjxError::InvalidOperation {
                message: "engine is closed".to_string(),
                context: operation.to_string(),
            });
        }
        Ok(())
    }

    fn grow_probe_index_buffer(&mut self, rows: usize) -> VjxResult<()> {
        if rows <= self.probed.len() {
            return Ok(());
        }
        let bytes = rows * std::mem::size_of::<i32>();
        match self.pib_reservation.as_mut() {
            Some(reservation) => reservation.try_resize(bytes)?,
            None => {
                self.pib_reservation = Some(self.pool.try_reserve(bytes)?);
            }
        }
        self.probed.resize(rows, NOT_FOUND);
        Ok(())
    }

    /// Materialize both sides for the rows emitted by the current call.
    fn emit(&mut self, probe: &RecordBatch) -> VjxResult<()> {
        let started = Instant::now();
        let probe_arrays = self
            .probe_copier
            .copy(probe, &self.probe_sv2[..self.output_records])?;
        self.metrics.probe_copy_ns += started.elapsed().as_nanos() as u64;

        let started = Instant::now();
        let build_arrays =
            self.build_copier
                .copy(&self.build.batches, &self.build_offsets, self.output_records)?;
        self.metrics.build_copy_ns += started.elapsed().as_nanos() as u64;

        self.install_output(build_arrays, probe_arrays)
    }

    fn install_output(
        &mut self,
        build_arrays: Vec<arrow::array::ArrayRef>,
        probe_arrays: Vec<arrow::array::ArrayRef>,
    ) -> VjxResult<()> {
        let mut columns = build_arrays;
        columns.extend(probe_arrays);
        let options = RecordBatchOptions::new().with_row_count(Some(self.output_records));
        let batch =
            RecordBatch::try_new_with_options(Arc::clone(&self.schema), columns, &options)?;
        self.pending = Some(batch);
        Ok(())
    }
}

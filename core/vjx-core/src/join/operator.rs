//! HashJoin Operator — the pull-based driver around the probe engine.

use crate::error::{VjxError, VjxResult};
use crate::exec::PhysicalOperator;
use crate::join::build::BuildSideBuilder;
use crate::join::probe::{ProbeEngine, ProbeMetrics, join_output_schema};
use crate::join::types::{BATCH_SIZE, JoinConfig, JoinType};
use crate::logging::BUILD_TARGET;
use crate::memory::MemoryPool;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

/// Hash join operator — build from the left child, probe from the right.
///
/// The probe engine's signed-count protocol stays internal: `next` keeps
/// calling [`ProbeEngine::probe_batch`] until the current probe batch is
/// consumed, then (for RIGHT/FULL) drains the unmatched-build phase, always
/// surfacing output one batch at a time.
pub struct HashJoinOperator {
    build_input: Box<dyn PhysicalOperator>,
    probe_input: Box<dyn PhysicalOperator>,
    schema: SchemaRef,
    /// (build_col_idx, probe_col_idx) pairs
    on: Vec<(usize, usize)>,
    join_type: JoinType,
    config: JoinConfig,
    pool: Arc<MemoryPool>,
    engine: Option<ProbeEngine>,
    current_probe: Option<RecordBatch>,
    probe_done: bool,
    non_match_done: bool,
}

impl HashJoinOperator {
    pub fn try_new(
        build_input: Box<dyn PhysicalOperator>,
        probe_input: Box<dyn PhysicalOperator>,
        on: Vec<(usize, usize)>,
        join_type: JoinType,
        config: JoinConfig,
        pool: Arc<MemoryPool>,
    ) -> VjxResult<Self> {
        if on.is_empty() {
            return Err(VjxError::Schema(
                "hash join requires at least one key pair".to_string(),
            ));
        }
        let build_schema = Arc::new(build_input.schema().clone());
        let probe_schema = Arc::new(probe_input.schema().clone());
        let build_projection: Vec<usize> = (0..build_schema.fields().len()).collect();
        let probe_projection: Vec<usize> = (0..probe_schema.fields().len()).collect();
        let schema = join_output_schema(
            &build_schema,
            &probe_schema,
            &build_projection,
            &probe_projection,
            join_type,
        )?;
        Ok(Self {
            build_input,
            probe_input,
            schema,
            on,
            join_type,
            config,
            pool,
            engine: None,
            current_probe: None,
            probe_done: false,
            non_match_done: false,
        })
    }

    /// Timing accumulators of the underlying engine, once built.
    pub fn probe_metrics(&self) -> Option<ProbeMetrics> {
        self.engine.as_ref().map(|e| e.metrics())
    }

    /// Drain the build child and assemble the hash table and chain tables.
    fn build_phase(&mut self) -> VjxResult<()> {
        let build_schema = Arc::new(self.build_input.schema().clone());
        let build_keys: Vec<usize> = self.on.iter().map(|&(b, _)| b).collect();
        let probe_keys: Vec<usize> = self.on.iter().map(|&(_, p)| p).collect();

        let mut collected: SmallVec<[RecordBatch; 8]> = SmallVec::new();
        while let Some(batch) = self.build_input.next()? {
            if batch.num_rows() > 0 {
                collected.push(batch);
            }
        }

        let mut builder =
            BuildSideBuilder::new(Arc::clone(&build_schema), build_keys, &self.config);
        for batch in collected {
            // Build batches are capped at the composite-index row capacity.
            let mut offset = 0;
            while offset < batch.num_rows() {
                let len = BATCH_SIZE.min(batch.num_rows() - offset);
                builder.push_batch(batch.slice(offset, len))?;
                offset += len;
            }
        }
        let (build_side, table) = builder.finish(probe_keys, self.config.null_equals_null);
        debug!(
            target: BUILD_TARGET,
            join_type = %self.join_type,
            build_rows = build_side.total_rows(),
            "hash join build phase complete"
        );

        let probe_schema = Arc::new(self.probe_input.schema().clone());
        let build_projection: Vec<usize> = (0..build_schema.fields().len()).collect();
        let probe_projection: Vec<usize> = (0..probe_schema.fields().len()).collect();
        self.engine = Some(ProbeEngine::try_new(
            &self.pool,
            self.join_type,
            build_side,
            Arc::new(table),
            &probe_schema,
            &build_projection,
            &probe_projection,
            &self.config,
        )?);
        Ok(())
    }
}

impl PhysicalOperator for HashJoinOperator {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next(&mut self) -> VjxResult<Option<RecordBatch>> {
        // Build phase (once)
        if self.engine.is_none() {
            self.build_phase()?;
        }

        // Probe phase: drive the engine until it hands back a non-empty
        // output batch or the probe side runs dry.
        while !self.probe_done {
            if self.current_probe.is_none() {
                match self.probe_input.next()? {
                    Some(batch) if batch.num_rows() > 0 => self.current_probe = Some(batch),
                    Some(_) => continue,
                    None => {
                        self.probe_done = true;
                        break;
                    }
                }
            }
            let batch = self.current_probe.clone().unwrap();
            let engine = self.engine.as_mut().unwrap();
            let emitted = engine.probe_batch(&batch)?;
            if emitted >= 0 {
                self.current_probe = None;
            }
            if let Some(output) = engine.take_output() {
                if output.num_rows() > 0 {
                    return Ok(Some(output));
                }
            }
        }

        // Terminal phase: unmatched build rows for RIGHT/FULL.
        if self.join_type.projects_unmatched_build() {
            while !self.non_match_done {
                let engine = self.engine.as_mut().unwrap();
                let emitted = engine.project_build_non_matches()?;
                if emitted >= 0 {
                    self.non_match_done = true;
                }
                if let Some(output) = engine.take_output() {
                    if output.num_rows() > 0 {
                        return Ok(Some(output));
                    }
                }
            }
        }

        Ok(None)
    }

    fn reset(&mut self) -> VjxResult<()> {
        if let Some(mut engine) = self.engine.take() {
            engine.close()?;
        }
        self.current_probe = None;
        self.probe_done = false;
        self.non_match_done = false;
        self.build_input.reset()?;
        self.probe_input.reset()
    }
}

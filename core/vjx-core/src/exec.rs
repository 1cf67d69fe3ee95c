//! Pull-based execution primitives — Volcano model.

use crate::error::VjxResult;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Physical operator trait — pull-based Volcano execution.
pub trait PhysicalOperator: Send {
    /// Output schema of this operator.
    fn schema(&self) -> &Schema;

    /// Next output batch, `None` when exhausted.
    fn next(&mut self) -> VjxResult<Option<RecordBatch>>;

    /// Reset operator state for re-execution.
    fn reset(&mut self) -> VjxResult<()>;
}

/// In-memory batch source — the scan feeding tests and benchmarks.
pub struct BatchSource {
    schema: SchemaRef,
    data: Vec<RecordBatch>,
    position: usize,
}

impl BatchSource {
    pub fn new(schema: SchemaRef, data: Vec<RecordBatch>) -> Self {
        Self {
            schema,
            data,
            position: 0,
        }
    }

    /// Source over existing batches, schema taken from the first one.
    pub fn from_batches(data: Vec<RecordBatch>) -> Self {
        let schema = data
            .first()
            .map(|b| b.schema())
            .unwrap_or_else(|| Arc::new(Schema::empty()));
        Self::new(schema, data)
    }
}

impl PhysicalOperator for BatchSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next(&mut self) -> VjxResult<Option<RecordBatch>> {
        if self.position >= self.data.len() {
            return Ok(None);
        }
        let batch = self.data[self.position].clone();
        self.position += 1;
        Ok(Some(batch))
    }

    fn reset(&mut self) -> VjxResult<()> {
        self.position = 0;
        Ok(())
    }
}

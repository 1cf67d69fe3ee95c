//! Column materialization for emitted output batches.
//!
//! The probe engine assembles *indices* only; copiers turn them into Arrow
//! arrays once per emitted batch. The probe copier gathers by the 16-bit
//! selection vector; the build copiers gather across build batches by the
//! 6-byte composite cells. Copier choice is fixed at construction — the
//! null-aware build copier serves joins that emit unmatched probe rows
//! (`SKIP` cells become nulls), the fast copier serves the rest and treats
//! a `SKIP` cell as corruption.

use crate::error::{VjxError, VjxResult};
use crate::join::chain::CompositeBuffer;
use crate::join::types::{SKIP, composite_batch, composite_row};
use arrow::array::{Array, ArrayRef, UInt16Array, new_empty_array, new_null_array};
use arrow::compute;
use arrow::datatypes::{FieldRef, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

fn project_fields(
    schema: &SchemaRef,
    projection: &[usize],
    force_nullable: bool,
) -> VjxResult<Vec<FieldRef>> {
    projection
        .iter()
        .map(|&idx| {
            let field = schema.fields().get(idx).ok_or_else(|| {
                VjxError::Schema(format!(
                    "projected column {idx} out of range for schema with {} fields",
                    schema.fields().len()
                ))
            })?;
            Ok(if force_nullable && !field.is_nullable() {
                Arc::new(field.as_ref().clone().with_nullable(true))
            } else {
                Arc::clone(field)
            })
        })
        .collect()
}

/// Gathers projected probe columns through the output selection vector.
pub struct ProbeCopier {
    columns: Vec<usize>,
    fields: Vec<FieldRef>,
}

impl ProbeCopier {
    /// `force_nullable` marks every output field nullable; used when the
    /// join's terminal phase null-projects the probe side.
    pub fn new(
        probe_schema: &SchemaRef,
        projection: &[usize],
        force_nullable: bool,
    ) -> VjxResult<Self> {
        Ok(Self {
            columns: projection.to_vec(),
            fields: project_fields(probe_schema, projection, force_nullable)?,
        })
    }

    /// Output fields this copier produces.
    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    /// Materialize the rows selected by `selection` from `probe`.
    pub fn copy(&self, probe: &RecordBatch, selection: &[u16]) -> VjxResult<Vec<ArrayRef>> {
        if selection.is_empty() {
            return Ok(self
                .fields
                .iter()
                .map(|f| new_empty_array(f.data_type()))
                .collect());
        }
        let indices = UInt16Array::from(selection.to_vec());
        self.columns
            .iter()
            .map(|&c| Ok(compute::take(probe.column(c).as_ref(), &indices, None)?))
            .collect()
    }

    /// Allocate all-null output columns of length `rows`, used when no probe
    /// row is projected.
    pub fn allocate(&self, rows: usize) -> Vec<ArrayRef> {
        self.fields
            .iter()
            .map(|f| new_null_array(f.data_type(), rows))
            .collect()
    }
}

/// Gathers projected build columns through the composite-index cells.
pub struct BuildCopier {
    columns: Vec<usize>,
    fields: Vec<FieldRef>,
    null_aware: bool,
}

impl BuildCopier {
    pub fn new(
        build_schema: &SchemaRef,
        projection: &[usize],
        null_aware: bool,
        force_nullable: bool,
    ) -> VjxResult<Self> {
        Ok(Self {
            columns: projection.to_vec(),
            fields: project_fields(build_schema, projection, force_nullable || null_aware)?,
            null_aware,
        })
    }

    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    /// Materialize `rows` cells of `offsets` against `batches`.
    pub fn copy(
        &self,
        batches: &[RecordBatch],
        offsets: &CompositeBuffer,
        rows: usize,
    ) -> VjxResult<Vec<ArrayRef>> {
        if rows == 0 {
            return Ok(self
                .fields
                .iter()
                .map(|f| new_empty_array(f.data_type()))
                .collect());
        }

        // Decode the cells once; every column reuses the index list. SKIP
        // cells route to a one-row null array appended past the real batches.
        let null_slot = batches.len();
        let mut indices = Vec::with_capacity(rows);
        for i in 0..rows {
            let cell = offsets.get(i);
            if cell == SKIP {
                if !self.null_aware {
                    return Err(VjxError::Invariant(
                        "null build cell reached the fast build copier".to_string(),
                    ));
                }
                indices.push((null_slot, 0));
            } else {
                let batch = composite_batch(cell);
                if batch >= batches.len() {
                    return Err(VjxError::Invariant(format!(
                        "composite index references build batch {batch} of {}",
                        batches.len()
                    )));
                }
                indices.push((batch, composite_row(cell)));
            }
        }

        self.columns
            .iter()
            .zip(&self.fields)
            .map(|(&c, field)| {
                let null_row = self
                    .null_aware
                    .then(|| new_null_array(field.data_type(), 1));
                let mut values: Vec<&dyn Array> =
                    batches.iter().map(|b| b.column(c).as_ref()).collect();
                if let Some(ref arr) = null_row {
                    values.push(arr.as_ref());
                }
                Ok(compute::interleave(&values, &indices)?)
            })
            .collect()
    }
}

//! # VJX — Vectorized Join eXecutor
//!
//! VJX is the vectorized hash-join probe engine of a columnar query runtime,
//! built on Apache Arrow `RecordBatch` data. The build side is indexed once
//! into a hash table plus chain tables; probe batches then stream past it,
//! producing output batches bounded to a fixed target size regardless of
//! join fan-out.
//!
//! ## Key Features
//!
//! - **Four-way join semantics**: INNER, LEFT, RIGHT, and FULL outer handled
//!   by one probe loop
//! - **Bounded output batches**: mid-batch suspension and resumption when a
//!   probe row fans out past the output capacity
//! - **Chain-table probe**: 6-byte composite build-row indices walked with a
//!   handful of loads per emitted row
//! - **Byte-accurate accounting**: every engine-owned buffer is charged to a
//!   shared memory pool
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{Int32Array, RecordBatch};
//! use arrow::datatypes::{DataType, Field, Schema};
//! use vjx_core::exec::{BatchSource, PhysicalOperator};
//! use vjx_core::join::{HashJoinOperator, JoinConfig, JoinType};
//! use vjx_core::memory::MemoryPool;
//!
//! # fn main() -> vjx_core::VjxResult<()> {
//! let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, false)]));
//! let build = RecordBatch::try_new(
//!     Arc::clone(&schema),
//!     vec![Arc::new(Int32Array::from(vec![1, 2, 3]))],
//! )?;
//! let probe = RecordBatch::try_new(
//!     Arc::clone(&schema),
//!     vec![Arc::new(Int32Array::from(vec![2, 3, 4]))],
//! )?;
//!
//! let mut join = HashJoinOperator::try_new(
//!     Box::new(BatchSource::from_batches(vec![build])),
//!     Box::new(BatchSource::from_batches(vec![probe])),
//!     vec![(0, 0)],
//!     JoinType::Inner,
//!     JoinConfig::default(),
//!     MemoryPool::unbounded(),
//! )?;
//!
//! let mut rows = 0;
//! while let Some(batch) = join.next()? {
//!     rows += batch.num_rows();
//! }
//! assert_eq!(rows, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! build batches → BuildSideBuilder → starts[] / links[] / bitmaps + hash table
//! probe batches → ProbeEngine::probe_batch → bounded output batches
//! (RIGHT/FULL)  → ProbeEngine::project_build_non_matches → null-probe rows
//! ```
//!
//! ## Module Structure
//! - [`join`] — build-side tables, probe engine, join operator
//! - [`exec`] — pull-based operator trait and in-memory source
//! - [`memory`] — byte-accurate pool and reservations
//! - [`error`] — [`VjxError`] / [`VjxResult`]

pub mod error;
pub mod exec;
pub mod join;
pub mod memory;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use error::{VjxError, VjxResult};
pub use join::{HashJoinOperator, JoinConfig, JoinType, ProbeEngine};

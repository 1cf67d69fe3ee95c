//! Vectorized hash join: build-side tables, probe engine, operator.

mod bitmap;
mod build;
mod chain;
mod copier;
mod hash_table;
mod operator;
mod probe;
mod types;

pub use bitmap::MatchBitmap;
pub use build::{BuildInfo, BuildSide, BuildSideBuilder};
pub use chain::CompositeBuffer;
pub use copier::{BuildCopier, ProbeCopier};
pub use hash_table::{JoinHashTable, JoinLookup};
pub use operator::HashJoinOperator;
pub use probe::{ProbeEngine, ProbeMetrics, join_output_schema};
pub use types::{
    BATCH_SIZE, BUILD_RECORD_LINK_SIZE, CBI_LOW_MASK, JoinConfig, JoinType, NOT_FOUND,
    NULL_COMPOSITE, SKIP, composite, composite_batch, composite_row,
};

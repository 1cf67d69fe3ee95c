//! Shared types and wire-level constants for the join engine.
//!
//! A build row is addressed by a *composite index*: a 48-bit value packing a
//! 32-bit build-batch index and a 16-bit row offset, carried in registers as
//! an `i64` and stored in buffers as 6 little-endian bytes. `-1` is the
//! sentinel at every layer it appears (no hash match, end of chain, null
//! build cell); the three meanings never cross an API boundary together.

/// Row capacity of one build batch; also the shift boundary in the
/// composite-index encoding.
pub const BATCH_SIZE: usize = 65536;

/// Mask isolating the row offset of a composite index.
pub const CBI_LOW_MASK: i64 = 0xFFFF;

/// Bytes per stored composite index: 4 (batch index) + 2 (row offset).
pub const BUILD_RECORD_LINK_SIZE: usize = 6;

/// Sentinel composite index: end of chain, or "emit nulls for build columns"
/// when it appears in the output offset buffer.
pub const NULL_COMPOSITE: i64 = -1;

/// Alias for [`NULL_COMPOSITE`] in its output-buffer role.
pub const SKIP: i64 = NULL_COMPOSITE;

/// Sentinel hash slot id: the probed key is absent from the build side.
pub const NOT_FOUND: i32 = -1;

/// Pack a build-batch index and row offset into a composite index.
#[inline]
pub fn composite(batch_idx: u32, row_idx: u16) -> i64 {
    ((batch_idx as i64) << 16) | row_idx as i64
}

/// Build-batch half of a composite index.
#[inline]
pub fn composite_batch(cbi: i64) -> usize {
    (cbi >> 16) as usize
}

/// Row-offset half of a composite index.
#[inline]
pub fn composite_row(cbi: i64) -> usize {
    (cbi & CBI_LOW_MASK) as usize
}

/// The four equi-join flavors the probe engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Probe rows without a build match still produce an output row
    /// (build columns null).
    #[inline]
    pub fn projects_unmatched_probe(self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    /// Build rows never paired with a probe row are emitted in a terminal
    /// phase (probe columns null).
    #[inline]
    pub fn projects_unmatched_build(self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        };
        write!(f, "{name}")
    }
}

/// Tunables for one hash-join instance.
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// Target output records per emitted batch (`B`).
    pub output_batch_size: usize,
    /// Whether a null key matches another null key.
    pub null_equals_null: bool,
    /// Build batches with at least this many rows hash their keys in
    /// parallel.
    pub parallel_build_threshold: usize,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            output_batch_size: 4096,
            null_equals_null: false,
            parallel_build_threshold: 1000,
        }
    }
}

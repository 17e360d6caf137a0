//! Error kinds returned by the scheduling core.

use thiserror::Error;

/// Failure modes the core can report back to its caller.
///
/// `InvalidDag` and `Internal` are fatal to the region: the caller is
/// expected to fall back to its own default scheduler. `OutOfRange` and
/// the timeout path surface the heuristic schedule instead of failing
/// outright (see [`crate::SchedulingResult`]).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The input graph is not a valid DAG, or a latency would force a
    /// negative cycle count.
    #[error("invalid dependence graph: {0}")]
    InvalidDag(String),

    /// The region's instruction count falls outside `MIN_DAG_SIZE` /
    /// `MAX_DAG_SIZE`.
    #[error("region size {size} outside configured range {min}..={max}")]
    OutOfRange {
        size: usize,
        min: usize,
        max: usize,
    },

    /// No schedule of any length was feasible. For a structurally valid
    /// DAG and machine model this should not happen; it is treated as a
    /// bug, not an ordinary failure.
    #[error("no feasible schedule exists for this region")]
    Unsatisfiable,

    /// A search deadline elapsed before a result could be produced.
    #[error("scheduling deadline exceeded")]
    Timeout,

    /// An internal invariant was violated; caught by the verifier.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

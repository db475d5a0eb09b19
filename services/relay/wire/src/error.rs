//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Datagram shorter than the fixed frame header
    #[error("incomplete frame header: {0} bytes")]
    Incomplete(usize),

    /// Datagram shorter than the header plus the declared payload length
    #[error("truncated payload: need {need} bytes, have {have}")]
    Truncated {
        /// Bytes the header declares (header included)
        need: usize,
        /// Bytes actually present
        have: usize,
    },

    /// Maximum fragment size outside `1..=MAX_FRAGMENT_SIZE`
    #[error("invalid fragment size: {0}")]
    FragmentSize(usize),

    /// Payload would need more fragments than a u32 can count
    #[error("too many fragments: {0}")]
    TooManyFragments(usize),

    /// Sequence number outside `[0, total)`
    #[error("sequence {seq} out of range for total {total}")]
    Sequence {
        /// Sequence number carried by the frame
        seq: u32,
        /// Total count carried by the frame
        total: u32,
    },

    /// Frame disagrees with the total count learned from the first frame
    #[error("total count mismatch: expected {expected}, got {got}")]
    TotalMismatch {
        /// Total count of the transfer in progress
        expected: u32,
        /// Total count carried by the frame
        got: u32,
    },

    /// Reassembly finished before every fragment arrived
    #[error("missing fragment {0}")]
    Missing(u32),

    /// Malformed fetch request
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

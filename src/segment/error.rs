//! Error types for buffer segments.

use thiserror::Error;

/// Why a segment could not be accessed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentState {
    /// The segment was default-constructed and has no backing store.
    Absent,
    /// The backing store has already been returned to its pool.
    Released,
}

impl SegmentState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Released => "released",
        }
    }
}

impl std::fmt::Display for SegmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Errors raised by [`BufferSegment`](super::BufferSegment) operations.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    /// An element index fell outside `[0, len)`.
    #[error("index {index} out of range for segment of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Length of the segment.
        len: usize,
    },

    /// An `(offset, count)` window does not fit inside its bounds.
    #[error("range at offset {offset} with count {count} exceeds length {len}")]
    RangeOutOfBounds {
        /// Start of the requested window.
        offset: usize,
        /// Number of elements requested.
        count: usize,
        /// Length the window must fit into.
        len: usize,
    },

    /// The destination of a copy is shorter than the source.
    #[error("destination holds {available} elements but {required} are required")]
    DestinationTooSmall {
        /// Elements the copy needs to write.
        required: usize,
        /// Capacity of the destination.
        available: usize,
    },

    /// The segment has no live backing store.
    #[error("segment is {0}")]
    InvalidState(SegmentState),
}

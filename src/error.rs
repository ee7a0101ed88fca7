// WHY: Invariant violations in the annotation model are fatal and must never be silently
// corrected, since a corrected span would corrupt every offset mapped through it

use std::ops::Range;
use thiserror::Error;

/// Errors raised by the annotation model, the coordinate mapper and the rolling window
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("span {start}..{end} is invalid for text of length {len}")]
    InvalidSpan { start: usize, end: usize, len: usize },

    #[error("offset {offset} does not fall on a character boundary")]
    NotCharBoundary { offset: usize },

    #[error("markers {first:?} and {second:?} overlap; skip and replace spans must be disjoint")]
    OverlappingMarkers {
        first: Range<usize>,
        second: Range<usize>,
    },

    #[error("offset {offset} lies before the retained window starting at {origin}")]
    OutsideWindow { offset: usize, origin: usize },

    #[error(
        "match of {len} bytes exceeds block size {block_size} for pattern {pattern}; \
         increase the block size or use a reluctant quantifier"
    )]
    MatchExceedsBlock {
        len: usize,
        block_size: usize,
        pattern: String,
    },

    #[error("invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Result alias used throughout the core
pub type Result<T> = std::result::Result<T, AnnotationError>;

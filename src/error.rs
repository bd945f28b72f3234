// src/error.rs
//
// Error taxonomy for arena processing.
//
// Three tiers, handled very differently:
//   - Recoverable segmentation faults (failed merge/split, bad blob count)
//     are NOT errors. They become per-frame flags and the pipeline keeps
//     going with whatever blobs exist.
//   - Structural invariant violations (broken interval partition, series
//     length mismatch, wrong fly count for a pair-only algorithm) abort the
//     arena. Continuing past one of these would silently corrupt identity.
//   - I/O faults on attribute files or annotation tables skip the affected
//     column with a warning and leave the rest of the arena intact.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("attribute '{name}' has {actual} frames, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("attribute '{name}': {reason}")]
    AttributeType { name: String, reason: String },

    #[error("interval partition is not a tiling of [0, {frame_count}): {reason}")]
    BrokenPartition { frame_count: usize, reason: String },

    #[error("identity resolution requires exactly 2 flies, arena has {actual}")]
    UnsupportedFlyCount { actual: usize },

    #[error("arena has no tracked frames; run track() first")]
    NotTracked,

    #[error("tracking data already normalized")]
    AlreadyNormalized,

    #[error("pipeline stage out of order: {0}")]
    StageOrder(&'static str),

    #[error("blob store: {0}")]
    Store(#[from] StoreError),

    #[error("i/o fault on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("log already finished")]
    Finished,

    #[error("record offset {offset} exceeds addressable range")]
    OffsetOverflow { offset: u64 },

    #[error("malformed record at offset {offset}: {reason}")]
    Malformed { offset: u32, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TrackingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

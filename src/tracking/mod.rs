// src/tracking/mod.rs
//
// Per-arena tracking and identity resolution.
//
// Signal flow:
//   foreground masks → segmenter → TrackedFrame records ─┐
//   boc carry (contour bisection during merges) ─────────┤
//                                                        ▼
//                normalize → columnar attribute collections
//                                                        │
//   misseg classify/auto-correct → occlusion partition   │
//   → interval scores (sSize / tPos / tMov / tBoc)       ▼
//   → hofacker decode → masked relabel of every collection
//                                                        │
//   interpolate gaps → heading decode (second hofacker)  ▼
//   → behavior derivation (behavior::)
//
// Orchestrated by arena::Arena::process().

pub mod annotation;
pub mod arena;
pub mod boc;
pub mod fly;
pub mod frame;
pub mod heading;
pub mod hofacker;
pub mod interpolate;
pub mod misseg;
pub mod occlusion;
pub mod scores;
pub mod segmenter;

// Re-exports for ergonomic access from the driver and tests.
pub use annotation::apply_annotations;
pub use arena::{Arena, ArenaConfig, Calibration};
pub use boc::OcclusionCarry;
pub use fly::{Fly, Quadrant, WingQuadrant};
pub use frame::TrackedFrame;
pub use heading::HeadingConfig;
pub use hofacker::{Resolution, ScoreChain};
pub use misseg::{AreaClass, MissegmentationConfig};
pub use occlusion::{BocRecord, FramePartition, Interval, OcclusionConfig};
pub use segmenter::{SegmentationConfig, SegmentedFrame};

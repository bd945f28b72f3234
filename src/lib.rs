// src/lib.rs
//
// Pair tracker for fly courtship assays.
//
// Pipeline per arena (fixed order, each stage consumes only what the
// previous one guarantees):
//
//   foreground masks ──▶ tracking::segmenter ──▶ per-frame blob records
//        │                                            │
//        │                 normalize ─▶ columnar attribute collections
//        │                                            │
//        │   missegmentation classify / auto-correct  │
//        │   occlusion partition + evidence scores    ▼
//        │   hofacker decode ─▶ masked relabel (identity)
//        │                                            │
//        │   interpolation ─▶ heading decode ─▶ masked wing/orientation fix
//        │                                            ▼
//        └──────────────▶ behavior predicates ─▶ courtship score + bouts
//
// Video decoding, arena detection and UI are external collaborators; the
// engine consumes foreground intensity grids through io::FrameSource and
// emits attribute directories, blob logs and bout events.

pub mod attributes;
pub mod behavior;
pub mod config;
pub mod error;
pub mod geometry;
pub mod imgproc;
pub mod io;
pub mod store;
pub mod tracking;

pub use config::Config;
pub use error::TrackingError;
pub use tracking::{Arena, ArenaConfig, Calibration};

// src/behavior/mod.rs
//
// Behavior derivation pipeline. Every predicate is built the same way:
//
//   geometric sub-predicates (physical thresholds)
//     -> per-sub median filter (odd window from seconds * frame rate)
//       -> logical AND
//         -> erode/dilate open pass (persistence width)
//
// and the per-fly courtship score is a weighted sum of predicate
// contributions thresholded at a fixed cutoff.

pub mod events;
pub mod filters;

pub use events::{derive_all, BehaviorConfig, BoutEvent};
pub use filters::{dilate_runs, erode_runs, median_filter_bool, median_filter_f32, odd_window, open_runs};

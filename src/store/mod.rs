// src/store/mod.rs
//
// Append-only binary logs for bulky per-blob data (contours, body
// histograms). Blobs are written once during the frame loop and addressed
// afterwards through opaque record handles stored in uint attributes; raw
// offsets never leak to call sites. Each log is flushed and closed exactly
// once, when the frame loop ends.

mod append_log;
mod contours;
mod histograms;

pub use append_log::AppendLog;
pub use contours::{ContourHandle, ContourLog, ContourReader};
pub use histograms::{HistogramHandle, HistogramLog, HistogramReader, HISTOGRAM_BINS};

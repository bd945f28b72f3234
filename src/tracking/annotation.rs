// src/tracking/annotation.rs
//
// Ground-truth identity corrections. An annotation table is a transposed
// TSV whose rows are keyed "(flyPair)/(column)":
//
//   0-1/fly0.x  float  N  ...
//   0-1/fly0.y  float  N  ...
//   0-1/fly1.x  float  N  ...
//   0-1/fly1.y  float  N  ...
//
// giving annotated per-frame centroids for the pair. Each sequence's
// tracked centroids are matched against the annotation by minimum-cost
// assignment; with a pair of flies the assignment reduces to comparing
// the two possible pairings, which is the full Hungarian problem at N=2.
// Sequences where the swapped pairing wins are flipped through the same
// relabel doorway the resolver uses. Malformed or missing columns skip
// the import with a warning, never abort the arena.

use std::path::Path;

use tracing::{info, warn};

use super::arena::Arena;
use crate::attributes::{names, read_table};
use crate::error::TrackingError;
use crate::geometry::{distance, Point};

const REQUIRED_COLUMNS: [&str; 4] = ["0-1/fly0.x", "0-1/fly0.y", "0-1/fly1.x", "0-1/fly1.y"];

/// Apply identity corrections from an annotation table. Returns the number
/// of sequences flipped.
pub fn apply_annotations(path: &Path, arena: &mut Arena) -> Result<usize, TrackingError> {
    let partition = arena
        .partition
        .clone()
        .ok_or(TrackingError::StageOrder("annotation import before resolve_occlusions"))?;
    let n = arena.frame_count();

    let rows = read_table(path)?;
    let mut columns: [Option<Vec<f32>>; 4] = [None, None, None, None];
    for row in &rows {
        let Some(slot) = REQUIRED_COLUMNS.iter().position(|&c| c == row.name) else {
            continue;
        };
        let parsed: Result<Vec<f32>, _> = row.values.iter().map(|v| v.parse::<f32>()).collect();
        match parsed {
            Ok(values) if values.len() == n => columns[slot] = Some(values),
            Ok(values) => warn!(
                column = %row.name,
                expected = n,
                actual = values.len(),
                "annotation column has wrong frame count, skipping"
            ),
            Err(e) => warn!(column = %row.name, error = %e, "unparsable annotation column, skipping"),
        }
    }
    let [Some(f0x), Some(f0y), Some(f1x), Some(f1y)] = columns else {
        warn!(path = %path.display(), "annotation table lacks the pair centroid columns");
        return Ok(0);
    };

    let occl = arena
        .frame_attrs
        .attrs
        .require(names::IS_OCCLUSION)?
        .as_bool()?
        .to_vec();
    let misseg = arena
        .frame_attrs
        .attrs
        .require(names::IS_MISSEGMENTED)?
        .as_bool()?
        .to_vec();
    let c0 = arena
        .fly_attrs
        .fly(0)
        .require(names::BODY_CENTROID)?
        .as_vec2()?
        .to_vec();
    let c1 = arena
        .fly_attrs
        .fly(1)
        .require(names::BODY_CENTROID)?
        .as_vec2()?
        .to_vec();

    // Per-sequence minimum-cost assignment between tracked and annotated
    // centroids, accumulated over the sequence's clean frames.
    let mut sequence_flips = Vec::with_capacity(partition.sequences.len());
    for seq in &partition.sequences {
        let mut straight = 0.0f32;
        let mut swapped = 0.0f32;
        let mut samples = 0usize;
        for f in seq.span.begin..seq.span.end {
            if occl[f] || misseg[f] {
                continue;
            }
            let t0 = Point::new(c0[f][0], c0[f][1]);
            let t1 = Point::new(c1[f][0], c1[f][1]);
            let g0 = Point::new(f0x[f], f0y[f]);
            let g1 = Point::new(f1x[f], f1y[f]);
            straight += distance(t0, g0) + distance(t1, g1);
            swapped += distance(t0, g1) + distance(t1, g0);
            samples += 1;
        }
        sequence_flips.push(samples > 0 && swapped < straight);
    }

    // Occlusion frames inherit the preceding sequence's decision.
    let mut mask = vec![false; n];
    for (i, seq) in partition.sequences.iter().enumerate() {
        for f in seq.span.begin..seq.span.end {
            mask[f] = sequence_flips[i];
        }
    }
    for (j, occ) in partition.occlusions.iter().enumerate() {
        let preceding = if partition.starts_with_occlusion {
            // Occlusion j sits before sequence j; a leading occlusion has
            // no preceding sequence and follows the one after it.
            j.saturating_sub(1)
        } else {
            j
        };
        let flip = sequence_flips.get(preceding).copied().unwrap_or(false);
        for f in occ.span.begin..occ.span.end {
            mask[f] = flip;
        }
    }

    let corrected = sequence_flips.iter().filter(|&&f| f).count();
    if corrected > 0 {
        arena.relabel_all(&mask)?;
    }
    info!(
        corrected,
        sequences = sequence_flips.len(),
        "annotation corrections applied"
    );
    Ok(corrected)
}

// src/tracking/misseg.rs
//
// Missegmentation: a non-occluded frame whose body areas fall outside the
// calibrated physical bounds. Short runs with decisive position evidence
// at their ends are corrected directly from the pos-score sign, without
// involving the global resolver; longer or weaker-evidence runs are
// escalated into full occlusions and left to it.

use serde::{Deserialize, Serialize};

use super::scores;
use crate::geometry::{distance, Point};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MissegmentationConfig {
    /// Plausible body area bounds, eccentricity-corrected, in mm^2.
    pub min_body_area_mm2: f32,
    pub max_body_area_mm2: f32,
    /// A run shorter than this is correctable with |pos| above the lower bar.
    pub short_run_seconds: f32,
    /// A run shorter than this is correctable with |pos| above the higher bar.
    pub long_run_seconds: f32,
    pub short_run_min_pos_score: f32,
    pub long_run_min_pos_score: f32,
}

impl Default for MissegmentationConfig {
    fn default() -> Self {
        Self {
            min_body_area_mm2: 0.3,
            max_body_area_mm2: 2.5,
            short_run_seconds: 0.2,
            long_run_seconds: 0.32,
            short_run_min_pos_score: 0.1,
            long_run_min_pos_score: 0.2,
        }
    }
}

/// Joint area classification of the two flies against the calibrated
/// bounds. Anything but `Normal` flags the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaClass {
    Normal,
    /// Both bodies too small (typically over-thresholded).
    BothSmall,
    /// One body too small.
    OneSmall,
    /// One too small and one too large (a piece changed owners).
    SmallLarge,
    /// One body too large.
    OneLarge,
    /// Both too large (typically debris merged in).
    BothLarge,
}

pub fn classify_areas(a0: f32, a1: f32, min: f32, max: f32) -> AreaClass {
    let small = (a0 < min, a1 < min);
    let large = (a0 > max, a1 > max);
    match (small, large) {
        ((true, true), _) => AreaClass::BothSmall,
        (_, (true, true)) => AreaClass::BothLarge,
        ((true, false), (false, true)) | ((false, true), (true, false)) => AreaClass::SmallLarge,
        ((true, false), _) | ((false, true), _) => AreaClass::OneSmall,
        (_, (true, false)) | (_, (false, true)) => AreaClass::OneLarge,
        _ => AreaClass::Normal,
    }
}

/// Apparent pixel area shrinks meaning as the fitted body stretches; the
/// correction rescales toward the round-body equivalent so one bound pair
/// works across postures.
pub fn eccentricity_corrected_area(area: f32, semi_major: f32, semi_minor: f32) -> f32 {
    if semi_major <= f32::EPSILON {
        return area;
    }
    area * (1.0 + semi_minor / semi_major) * 0.5
}

/// What to do with one missegmented run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDecision {
    /// Evidence says the labels swapped across the run: flip everything
    /// from the run start onward.
    CorrectSwap,
    /// Evidence says the labels held: leave as is.
    KeepStraight,
    /// Too long or too ambiguous: escalate the run to an occlusion.
    Escalate,
}

pub fn decide_run(
    run_len_frames: usize,
    pos_score: Option<f32>,
    frame_rate: f32,
    cfg: &MissegmentationConfig,
) -> RunDecision {
    let Some(score) = pos_score else {
        return RunDecision::Escalate;
    };
    let run_seconds = run_len_frames as f32 / frame_rate;
    let decisive = (run_seconds < cfg.short_run_seconds
        && score.abs() > cfg.short_run_min_pos_score)
        || (run_seconds < cfg.long_run_seconds && score.abs() > cfg.long_run_min_pos_score);
    if !decisive {
        RunDecision::Escalate
    } else if score < 0.0 {
        RunDecision::CorrectSwap
    } else {
        RunDecision::KeepStraight
    }
}

/// Position score across a run boundary: frame `before` against frame
/// `after`, straight vs swapped.
pub fn run_pos_score(
    centroid: [&[[f32; 2]]; 2],
    before: usize,
    after: usize,
) -> f32 {
    let p = |fly: usize, f: usize| Point::new(centroid[fly][f][0], centroid[fly][f][1]);
    let straight = distance(p(0, before), p(0, after)) + distance(p(1, before), p(1, after));
    let swapped = distance(p(0, before), p(1, after)) + distance(p(1, before), p(0, after));
    scores::boundary_score(straight, swapped)
}

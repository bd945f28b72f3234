// src/tracking/occlusion.rs
//
// Partitioning of the frame axis into alternating sequence (unambiguous)
// and occlusion (ambiguous) intervals, the evidence scores at interval
// granularity, and the conversion of a decode into a per-frame flip mask.
//
// Sign conventions match scores.rs: positive evidence supports the current
// labeling. The occlusion transition value fed to the decode is the sum of
// two independent log-odds channels: the stronger of position/contour
// continuity, plus the motion channel when enough clean frames surround
// the interval.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::hofacker::ScoreChain;
use super::scores;
use crate::error::TrackingError;
use crate::geometry::{distance, Point};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionConfig {
    /// Steepness of the score -> probability logistic.
    pub logistic_steepness: f32,
    /// Clean frames required on both sides of an occlusion before the
    /// motion channel is trusted.
    pub motion_window: usize,
    /// |sSize| below this means an adjacent sequence carries no usable
    /// size evidence (relevant for interpolation class selection).
    pub min_size_evidence: f32,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            logistic_steepness: 4.0,
            motion_window: 5,
            min_size_evidence: 0.2,
        }
    }
}

/// Half-open frame interval [begin, end).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub begin: usize,
    pub end: usize,
}

impl Interval {
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    pub fn contains(&self, frame: usize) -> bool {
        frame >= self.begin && frame < self.end
    }
}

#[derive(Debug, Clone)]
pub struct SequenceInterval {
    pub span: Interval,
    /// Sign test of the two flies' body areas over the interval.
    pub s_size: f32,
    /// Log-odds of s_size.
    pub s_combined: f32,
}

#[derive(Debug, Clone)]
pub struct OcclusionInterval {
    pub span: Interval,
    pub t_pos: f32,
    pub t_mov: f32,
    pub t_boc: f32,
    /// The stronger of t_pos / t_boc (raw score).
    pub t_combined: f32,
    /// Decode input: logodd(t_combined) + logodd(t_mov).
    pub t_logodd: f32,
}

/// Contour-continuity evidence recorded during the frame loop, one entry
/// per carried-through ambiguous run.
#[derive(Debug, Clone, Copy)]
pub struct BocRecord {
    pub begin: usize,
    pub end: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct FramePartition {
    pub sequences: Vec<SequenceInterval>,
    pub occlusions: Vec<OcclusionInterval>,
    pub frame_count: usize,
    pub starts_with_occlusion: bool,
}

impl FramePartition {
    /// Build the alternating partition from per-frame ambiguity flags.
    /// Scores are filled in by `score()`.
    pub fn build(occluded: &[bool]) -> Self {
        let frame_count = occluded.len();
        let mut sequences = Vec::new();
        let mut occlusions = Vec::new();
        let starts_with_occlusion = occluded.first().copied().unwrap_or(false);

        let mut begin = 0usize;
        let mut i = 0usize;
        while i < frame_count {
            let flag = occluded[begin];
            while i < frame_count && occluded[i] == flag {
                i += 1;
            }
            let span = Interval { begin, end: i };
            if flag {
                occlusions.push(OcclusionInterval {
                    span,
                    t_pos: 0.0,
                    t_mov: 0.0,
                    t_boc: 0.0,
                    t_combined: 0.0,
                    t_logodd: 0.0,
                });
            } else {
                sequences.push(SequenceInterval {
                    span,
                    s_size: 0.0,
                    s_combined: 0.0,
                });
            }
            begin = i;
        }

        Self {
            sequences,
            occlusions,
            frame_count,
            starts_with_occlusion,
        }
    }

    /// Structural invariant: the two interval lists alternate and exactly
    /// tile [0, frame_count). A violation here is fatal for the arena.
    pub fn validate(&self) -> Result<(), TrackingError> {
        let broken = |reason: String| TrackingError::BrokenPartition {
            frame_count: self.frame_count,
            reason,
        };
        let mut merged: Vec<(Interval, bool)> = self
            .sequences
            .iter()
            .map(|s| (s.span, false))
            .chain(self.occlusions.iter().map(|o| (o.span, true)))
            .collect();
        merged.sort_by_key(|(span, _)| span.begin);

        let mut cursor = 0usize;
        let mut last_kind: Option<bool> = None;
        for (span, kind) in &merged {
            if span.is_empty() {
                return Err(broken(format!("empty interval at {}", span.begin)));
            }
            if span.begin != cursor {
                return Err(broken(format!(
                    "gap or overlap at frame {} (interval starts at {})",
                    cursor, span.begin
                )));
            }
            if last_kind == Some(*kind) {
                return Err(broken(format!(
                    "two adjacent intervals of the same kind at frame {}",
                    span.begin
                )));
            }
            cursor = span.end;
            last_kind = Some(*kind);
        }
        if cursor != self.frame_count {
            return Err(broken(format!("tiling ends at {cursor}")));
        }
        Ok(())
    }

    /// Fill in interval evidence. `centroid`/`area` are per-fly series,
    /// `clean` marks frames usable as anchors (tracked, not ambiguous,
    /// not missegmented).
    pub fn score(
        &mut self,
        centroid: [&[[f32; 2]]; 2],
        area: [&[f32]; 2],
        clean: &[bool],
        boc: &[BocRecord],
        cfg: &OcclusionConfig,
    ) {
        for seq in &mut self.sequences {
            let mut a0 = Vec::new();
            let mut a1 = Vec::new();
            for f in seq.span.begin..seq.span.end {
                if clean[f] {
                    a0.push(area[0][f]);
                    a1.push(area[1][f]);
                }
            }
            seq.s_size = scores::sign_test(&a0, &a1);
            // Sign-test certainty grows with the number of decisive frames;
            // scale like the z statistic before the logistic so a long
            // unanimous sequence outweighs any single boundary score.
            let decisive = a0.iter().zip(&a1).filter(|(x, y)| x != y).count();
            seq.s_combined = scores::score_to_logodd(
                seq.s_size * (decisive as f32).sqrt(),
                cfg.logistic_steepness,
            );
        }

        let frame_count = self.frame_count;
        for occ in &mut self.occlusions {
            let b = occ.span.begin;
            let e = occ.span.end;

            // Position channel needs anchors on both sides.
            if b > 0 && e < frame_count && clean[b - 1] && clean[e] {
                let p = |fly: usize, f: usize| {
                    Point::new(centroid[fly][f][0], centroid[fly][f][1])
                };
                let straight =
                    distance(p(0, b - 1), p(0, e)) + distance(p(1, b - 1), p(1, e));
                let swapped =
                    distance(p(0, b - 1), p(1, e)) + distance(p(1, b - 1), p(0, e));
                occ.t_pos = scores::boundary_score(straight, swapped);
            }

            occ.t_mov = motion_score(centroid, clean, b, e, frame_count, cfg.motion_window);

            occ.t_boc = boc
                .iter()
                .find(|r| r.begin < e && b < r.end)
                .map(|r| r.score)
                .unwrap_or(0.0);

            occ.t_combined = if occ.t_pos.abs() >= occ.t_boc.abs() {
                occ.t_pos
            } else {
                occ.t_boc
            };
            occ.t_logodd = scores::score_to_logodd(occ.t_combined, cfg.logistic_steepness)
                + scores::score_to_logodd(occ.t_mov, cfg.logistic_steepness);

            debug!(
                begin = b,
                end = e,
                t_pos = occ.t_pos,
                t_mov = occ.t_mov,
                t_boc = occ.t_boc,
                "occlusion scored"
            );
        }
    }

    /// Alternating chain for the global decode, padded with zero-valued
    /// sentinel anchors when the video starts or ends ambiguous.
    pub fn to_chain(&self) -> ScoreChain {
        let mut anchors = Vec::new();
        let mut transitions = Vec::new();
        if self.starts_with_occlusion {
            anchors.push(0.0);
        }
        let mut si = 0usize;
        let mut oi = 0usize;
        // Walk in frame order.
        let mut expect_sequence = !self.starts_with_occlusion;
        loop {
            if expect_sequence {
                if si >= self.sequences.len() {
                    break;
                }
                anchors.push(self.sequences[si].s_combined);
                si += 1;
            } else {
                if oi >= self.occlusions.len() {
                    break;
                }
                transitions.push(self.occlusions[oi].t_logodd);
                oi += 1;
            }
            expect_sequence = !expect_sequence;
        }
        // Trailing occlusion needs a closing sentinel anchor.
        if anchors.len() == transitions.len() {
            anchors.push(0.0);
        }
        ScoreChain {
            anchors,
            transitions,
        }
    }

    /// Convert anchor flip decisions into a per-frame mask. Frames inside
    /// an occlusion keep the identity of the frame immediately preceding
    /// the occlusion, so downstream body splitting stays aligned with the
    /// pre-occlusion blob order; a leading occlusion follows the sentinel.
    pub fn flip_mask(&self, anchor_flips: &[bool]) -> Vec<bool> {
        let mut mask = vec![false; self.frame_count];
        let offset = usize::from(self.starts_with_occlusion);
        for (i, seq) in self.sequences.iter().enumerate() {
            let flip = anchor_flips.get(i + offset).copied().unwrap_or(false);
            for f in seq.span.begin..seq.span.end {
                mask[f] = flip;
            }
        }
        for (j, occ) in self.occlusions.iter().enumerate() {
            // Transition j sits between chain anchors j and j+1, so the
            // anchor preceding occlusion j is always index j.
            let flip = anchor_flips.get(j).copied().unwrap_or(false);
            for f in occ.span.begin..occ.span.end {
                mask[f] = flip;
            }
        }
        mask
    }

    /// The occlusion containing `frame`, if any.
    pub fn occlusion_at(&self, frame: usize) -> Option<&OcclusionInterval> {
        self.occlusions.iter().find(|o| o.span.contains(frame))
    }

    /// Does the occlusion have a size-evidence anchor on either side?
    pub fn occlusion_has_size_evidence(
        &self,
        occ: &OcclusionInterval,
        min_evidence: f32,
    ) -> bool {
        self.sequences.iter().any(|s| {
            (s.span.end == occ.span.begin || s.span.begin == occ.span.end)
                && s.s_size.abs() >= min_evidence
        })
    }
}

/// Mean-velocity similarity across an occlusion, only when `window` clean
/// frames exist on both sides.
fn motion_score(
    centroid: [&[[f32; 2]]; 2],
    clean: &[bool],
    begin: usize,
    end: usize,
    frame_count: usize,
    window: usize,
) -> f32 {
    if window < 2 || begin < window || end + window > frame_count {
        return 0.0;
    }
    if !(begin - window..begin).all(|f| clean[f]) || !(end..end + window).all(|f| clean[f]) {
        return 0.0;
    }
    let span = (window - 1) as f32;
    let vel = |fly: usize, from: usize, to: usize| {
        Point::new(
            (centroid[fly][to][0] - centroid[fly][from][0]) / span,
            (centroid[fly][to][1] - centroid[fly][from][1]) / span,
        )
    };
    let before = [vel(0, begin - window, begin - 1), vel(1, begin - window, begin - 1)];
    let after = [vel(0, end, end + window - 1), vel(1, end, end + window - 1)];
    let straight = distance(before[0], after[0]) + distance(before[1], after[1]);
    let swapped = distance(before[0], after[1]) + distance(before[1], after[0]);
    scores::boundary_score(straight, swapped)
}

// src/tracking/arena.rs
//
// One tracked region and its processing pipeline. The stage order is
// fixed because every stage consumes only what the previous one
// guarantees:
//
//   track -> normalize -> detect missegmentation -> resolve occlusions
//         -> interpolate -> resolve heading -> derive behavior
//
// During track() the arena accumulates per-frame records; normalize
// converts them into the three columnar attribute collections and drops
// the records. The two global re-labelling passes (occlusion identity,
// heading) rewrite those collections in place through Relabel.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::boc::OcclusionCarry;
use super::fly::Quadrant;
use super::frame::TrackedFrame;
use super::heading::{self, HeadingConfig};
use super::hofacker;
use super::interpolate::{self, find_gaps};
use super::misseg::{self, MissegmentationConfig, RunDecision};
use super::occlusion::{BocRecord, FramePartition, OcclusionConfig};
use super::segmenter::{self, SegmentationConfig};
use crate::attributes::{
    export_attributes, names, Attribute, AttributeClass, AttributeData, FlyAttributes,
    FrameAttributes, PairAttributes, Relabel, PAIR_FLY_COUNT,
};
use crate::behavior::{self, BehaviorConfig, BoutEvent};
use crate::error::TrackingError;
use crate::geometry::{distance, Point};
use crate::io::FrameSource;
use crate::store::{ContourLog, HistogramLog};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Calibration {
    pub pixel_per_millimeter: f32,
    pub source_frame_rate: f32,
    /// Animals expected in this arena; identity resolution needs exactly 2.
    pub fly_count: usize,
}

impl Calibration {
    pub fn mm_to_px(&self, mm: f32) -> f32 {
        mm * self.pixel_per_millimeter
    }

    pub fn mm2_to_px2(&self, mm2: f32) -> f32 {
        mm2 * self.pixel_per_millimeter * self.pixel_per_millimeter
    }

    pub fn mm_per_s_to_px_per_frame(&self, mm_per_s: f32) -> f32 {
        mm_per_s * self.pixel_per_millimeter / self.source_frame_rate
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub segmentation: SegmentationConfig,
    pub occlusion: OcclusionConfig,
    pub missegmentation: MissegmentationConfig,
    pub heading: HeadingConfig,
    pub behavior: BehaviorConfig,
}

pub struct Arena {
    pub index: usize,
    pub calibration: Calibration,
    pub config: ArenaConfig,
    frames: Vec<TrackedFrame>,
    normalized: bool,
    pub frame_attrs: FrameAttributes,
    pub fly_attrs: FlyAttributes,
    pub pair_attrs: PairAttributes,
    boc_records: Vec<BocRecord>,
    pub partition: Option<FramePartition>,
}

impl Arena {
    pub fn new(index: usize, calibration: Calibration, config: ArenaConfig) -> Self {
        Self {
            index,
            calibration,
            config,
            frames: Vec::new(),
            normalized: false,
            frame_attrs: FrameAttributes::new(),
            fly_attrs: FlyAttributes::new(calibration.fly_count),
            pair_attrs: PairAttributes::new(calibration.fly_count),
            boc_records: Vec::new(),
            partition: None,
        }
    }

    /// Full pipeline in the mandatory stage order.
    pub fn process(
        &mut self,
        source: &mut dyn FrameSource,
        store_dir: &Path,
    ) -> Result<Vec<BoutEvent>, TrackingError> {
        self.track(source, store_dir)?;
        self.normalize_tracking_data()?;
        self.detect_missegmentation()?;
        self.resolve_occlusions()?;
        self.interpolate()?;
        self.resolve_heading()?;
        self.derive_behavior()
    }

    // ── stage 1: frame loop ─────────────────────────────────────────────

    pub fn track(
        &mut self,
        source: &mut dyn FrameSource,
        store_dir: &Path,
    ) -> Result<(), TrackingError> {
        if self.normalized {
            return Err(TrackingError::AlreadyNormalized);
        }
        fs::create_dir_all(store_dir).map_err(|e| TrackingError::io(store_dir, e))?;
        let mut contours = ContourLog::create(&store_dir.join("contours.bin"))?;
        let mut histograms = HistogramLog::create(&store_dir.join("histograms.bin"))?;

        let mut carry = OcclusionCarry::new();
        let mut prev_centroids: Option<[Point; 2]> = None;
        let mut open_boc: Option<usize> = None;
        let mut index = 0usize;

        while let Some(intensity) = source.next_frame()? {
            let split_seeds = carry.seeds().cloned();
            let mut out = segmenter::segment_frame(
                index,
                &intensity,
                self.calibration.fly_count,
                split_seeds.as_ref(),
                &self.config.segmentation,
                &self.calibration,
                &mut contours,
                &mut histograms,
            )?;

            // Within-sequence continuity: keep blob order aligned with the
            // previous frame by centroid distance. Split products already
            // arrive in carry order and are left alone.
            let split_frame = out.frame.flies.iter().any(|f| f.body_split);
            if out.frame.flies.len() == 2 && !split_frame {
                if let Some(prev) = prev_centroids {
                    let c0 = out.frame.flies[0].body.centroid;
                    let c1 = out.frame.flies[1].body.centroid;
                    let straight = distance(prev[0], c0) + distance(prev[1], c1);
                    let swapped = distance(prev[0], c1) + distance(prev[1], c0);
                    if swapped < straight {
                        out.frame.flies.swap(0, 1);
                        out.fly_boundaries.swap(0, 1);
                    }
                }
            }

            let touched = out.frame.is_occlusion_touched();
            if touched {
                if open_boc.is_none() {
                    open_boc = Some(index);
                }
                match out.frame.flies.len() {
                    1 => carry.bisect_merged(&out.fly_boundaries[0]),
                    2 if split_frame => {
                        // The growth race already partitioned per identity.
                        carry.reset(out.fly_boundaries[0].clone(), out.fly_boundaries[1].clone());
                    }
                    _ => carry.invalidate(),
                }
            } else if out.frame.flies.len() == PAIR_FLY_COUNT {
                if let Some(begin) = open_boc.take() {
                    let score = carry.score_exit(&out.fly_boundaries[0], &out.fly_boundaries[1]);
                    self.boc_records.push(BocRecord {
                        begin,
                        end: index,
                        score,
                    });
                }
                carry.reset(out.fly_boundaries[0].clone(), out.fly_boundaries[1].clone());
                prev_centroids = Some([
                    out.frame.flies[0].body.centroid,
                    out.frame.flies[1].body.centroid,
                ]);
            }

            self.frames.push(out.frame);
            index += 1;
        }

        // Trailing ambiguity never sees an exit frame.
        if let Some(begin) = open_boc.take() {
            self.boc_records.push(BocRecord {
                begin,
                end: index,
                score: 0.0,
            });
        }

        // The logs flush and close exactly once, here.
        contours.finish()?;
        histograms.finish()?;

        info!(
            arena = self.index,
            frames = index,
            boc_runs = self.boc_records.len(),
            "tracking pass complete"
        );
        Ok(())
    }

    // ── stage 2: columnar conversion ────────────────────────────────────

    pub fn normalize_tracking_data(&mut self) -> Result<(), TrackingError> {
        if self.normalized {
            return Err(TrackingError::AlreadyNormalized);
        }
        if self.frames.is_empty() {
            return Err(TrackingError::NotTracked);
        }
        let n = self.frames.len();
        let fc = self.calibration.fly_count;

        // Per-frame series.
        let tracked: Vec<u32> = self.frames.iter().map(|f| f.flies.len() as u32).collect();
        let occl: Vec<bool> = self.frames.iter().map(|f| f.is_occlusion_touched()).collect();
        let misseg: Vec<bool> = self.frames.iter().map(|f| f.is_missegmented).collect();
        let body_thr: Vec<u32> = self.frames.iter().map(|f| f.body_threshold as u32).collect();
        let wing_thr: Vec<u32> = self.frames.iter().map(|f| f.wing_threshold as u32).collect();
        let fa = &mut self.frame_attrs.attrs;
        let tracked_attr = |name: &str, unit: &'static str, data: AttributeData| {
            Attribute::new(name, unit, AttributeClass::Tracked, data)
        };
        fa.insert(tracked_attr(names::TRACKED_FLY_COUNT, "", AttributeData::Uint(tracked)));
        fa.insert(tracked_attr(names::IS_OCCLUSION, "", AttributeData::Bool(occl)));
        fa.insert(tracked_attr(names::IS_MISSEGMENTED, "", AttributeData::Bool(misseg)));
        fa.insert(tracked_attr(names::BODY_THRESHOLD, "", AttributeData::Uint(body_thr)));
        fa.insert(tracked_attr(names::WING_THRESHOLD, "", AttributeData::Uint(wing_thr)));
        fa.insert(tracked_attr(
            names::ID_PERMUTATION,
            "",
            AttributeData::Bool(vec![false; n]),
        ));

        // Per-fly series.
        const QUAD_AREAS: [(&str, Quadrant); 4] = [
            (names::WING_AREA_FRONT_LEFT, Quadrant::FrontLeft),
            (names::WING_AREA_FRONT_RIGHT, Quadrant::FrontRight),
            (names::WING_AREA_REAR_LEFT, Quadrant::RearLeft),
            (names::WING_AREA_REAR_RIGHT, Quadrant::RearRight),
        ];
        const QUAD_ANGLES: [(&str, Quadrant); 4] = [
            (names::WING_ANGLE_FRONT_LEFT, Quadrant::FrontLeft),
            (names::WING_ANGLE_FRONT_RIGHT, Quadrant::FrontRight),
            (names::WING_ANGLE_REAR_LEFT, Quadrant::RearLeft),
            (names::WING_ANGLE_REAR_RIGHT, Quadrant::RearRight),
        ];
        const QUAD_TIPS: [(&str, Quadrant); 4] = [
            (names::WING_TIP_FRONT_LEFT, Quadrant::FrontLeft),
            (names::WING_TIP_FRONT_RIGHT, Quadrant::FrontRight),
            (names::WING_TIP_REAR_LEFT, Quadrant::RearLeft),
            (names::WING_TIP_REAR_RIGHT, Quadrant::RearRight),
        ];

        for i in 0..fc {
            let mut centroid = Vec::with_capacity(n);
            let mut area = Vec::with_capacity(n);
            let mut major = Vec::with_capacity(n);
            let mut minor = Vec::with_capacity(n);
            let mut orientation = Vec::with_capacity(n);
            let mut eccentricity = Vec::with_capacity(n);
            let mut split = Vec::with_capacity(n);
            let mut missing = Vec::with_capacity(n);
            let mut wing_area = Vec::with_capacity(n);
            let mut color_cue = Vec::with_capacity(n);
            let mut shape_cue = Vec::with_capacity(n);
            let mut wing_cue = Vec::with_capacity(n);
            let mut body_contour = Vec::with_capacity(n);
            let mut wing_contour = Vec::with_capacity(n);
            let mut histogram = Vec::with_capacity(n);
            let mut quad_area: [Vec<f32>; 4] = Default::default();
            let mut quad_angle: [Vec<f32>; 4] = Default::default();
            let mut quad_tip: [Vec<[f32; 2]>; 4] = Default::default();

            for frame in &self.frames {
                match frame.flies.get(i) {
                    Some(fly) => {
                        centroid.push([fly.body.centroid.x, fly.body.centroid.y]);
                        area.push(fly.body.area);
                        major.push(fly.body.semi_major);
                        minor.push(fly.body.semi_minor);
                        orientation.push(fly.body.orientation);
                        eccentricity.push(fly.body.eccentricity());
                        split.push(fly.body_split);
                        missing.push(false);
                        wing_area.push(fly.quadrants.iter().map(|q| q.area).sum());
                        color_cue.push(fly.color_cue);
                        shape_cue.push(fly.shape_cue);
                        wing_cue.push(fly.wing_cue);
                        body_contour.push(fly.body_contour.to_raw());
                        wing_contour.push(fly.wing_contour.to_raw());
                        histogram.push(fly.histogram.to_raw());
                        for (k, (_, q)) in QUAD_AREAS.iter().enumerate() {
                            quad_area[k].push(fly.quadrant(*q).area);
                            quad_angle[k].push(fly.quadrant(*q).mean_angle);
                            let tip = fly.quadrant(*q).tip;
                            quad_tip[k].push([tip.x, tip.y]);
                        }
                    }
                    None => {
                        centroid.push([0.0, 0.0]);
                        area.push(0.0);
                        major.push(0.0);
                        minor.push(0.0);
                        orientation.push(0.0);
                        eccentricity.push(0.0);
                        split.push(false);
                        missing.push(true);
                        wing_area.push(0.0);
                        color_cue.push(0.0);
                        shape_cue.push(0.0);
                        wing_cue.push(0.0);
                        body_contour.push(0);
                        wing_contour.push(0);
                        histogram.push(0);
                        for k in 0..4 {
                            quad_area[k].push(0.0);
                            quad_angle[k].push(0.0);
                            quad_tip[k].push([0.0, 0.0]);
                        }
                    }
                }
            }

            let map = self.fly_attrs.fly_mut(i);
            map.insert(tracked_attr(names::BODY_CENTROID, "px", AttributeData::Vec2(centroid)));
            map.insert(tracked_attr(names::BODY_AREA, "px^2", AttributeData::Float(area)));
            map.insert(tracked_attr(names::BODY_MAJOR_AXIS, "px", AttributeData::Float(major)));
            map.insert(tracked_attr(names::BODY_MINOR_AXIS, "px", AttributeData::Float(minor)));
            map.insert(tracked_attr(
                names::BODY_ORIENTATION,
                "rad",
                AttributeData::Float(orientation),
            ));
            map.insert(tracked_attr(
                names::BODY_ECCENTRICITY,
                "",
                AttributeData::Float(eccentricity),
            ));
            map.insert(tracked_attr(names::BODY_SPLIT, "", AttributeData::Bool(split)));
            map.insert(tracked_attr(names::MISSING, "", AttributeData::Bool(missing)));
            map.insert(tracked_attr(names::WING_AREA, "px^2", AttributeData::Float(wing_area)));
            map.insert(tracked_attr(names::HEADING_COLOR_CUE, "", AttributeData::Float(color_cue)));
            map.insert(tracked_attr(names::HEADING_SHAPE_CUE, "", AttributeData::Float(shape_cue)));
            map.insert(tracked_attr(names::HEADING_WING_CUE, "", AttributeData::Float(wing_cue)));
            map.insert(tracked_attr(names::BODY_CONTOUR, "", AttributeData::Uint(body_contour)));
            map.insert(tracked_attr(names::WING_CONTOUR, "", AttributeData::Uint(wing_contour)));
            map.insert(tracked_attr(names::BODY_HISTOGRAM, "", AttributeData::Uint(histogram)));
            for (k, &(name, _)) in QUAD_AREAS.iter().enumerate() {
                map.insert(tracked_attr(name, "px^2", AttributeData::Float(quad_area[k].clone())));
            }
            for (k, &(name, _)) in QUAD_ANGLES.iter().enumerate() {
                map.insert(tracked_attr(name, "rad", AttributeData::Float(quad_angle[k].clone())));
            }
            for (k, &(name, _)) in QUAD_TIPS.iter().enumerate() {
                map.insert(tracked_attr(name, "px", AttributeData::Vec2(quad_tip[k].clone())));
            }
        }

        self.frames = Vec::new();
        self.normalized = true;
        self.validate_lengths(n)?;
        info!(arena = self.index, frames = n, "tracking data normalized");
        Ok(())
    }

    // ── stage 3: missegmentation ────────────────────────────────────────

    pub fn detect_missegmentation(&mut self) -> Result<(), TrackingError> {
        self.require_normalized()?;
        let n = self.frame_count();
        let cal = self.calibration;
        let cfg = self.config.missegmentation.clone();

        if cal.fly_count != PAIR_FLY_COUNT {
            debug!(arena = self.index, "missegmentation pass needs a pair arena, skipping");
            return Ok(());
        }

        let occl = self.frame_bools(names::IS_OCCLUSION)?;
        let mut misseg = self.frame_bools(names::IS_MISSEGMENTED)?;
        let missing = [
            self.fly_bools(0, names::MISSING)?,
            self.fly_bools(1, names::MISSING)?,
        ];

        // Classification against the calibrated physical bounds.
        let min_px2 = cal.mm2_to_px2(cfg.min_body_area_mm2);
        let max_px2 = cal.mm2_to_px2(cfg.max_body_area_mm2);
        {
            let mut corrected: [Vec<f32>; 2] = [Vec::new(), Vec::new()];
            for fly in 0..2 {
                let area = self.fly_floats(fly, names::BODY_AREA)?;
                let major = self.fly_floats(fly, names::BODY_MAJOR_AXIS)?;
                let minor = self.fly_floats(fly, names::BODY_MINOR_AXIS)?;
                corrected[fly] = (0..n)
                    .map(|f| misseg::eccentricity_corrected_area(area[f], major[f], minor[f]))
                    .collect();
            }
            for f in 0..n {
                if occl[f] || missing[0][f] || missing[1][f] {
                    continue;
                }
                let class = misseg::classify_areas(
                    corrected[0][f],
                    corrected[1][f],
                    min_px2,
                    max_px2,
                );
                if class != misseg::AreaClass::Normal {
                    misseg[f] = true;
                }
            }
        }

        // Maximal missegmented runs outside occlusions.
        let mut runs: Vec<(usize, usize)> = Vec::new();
        let mut f = 0;
        while f < n {
            if misseg[f] && !occl[f] {
                let b = f;
                while f < n && misseg[f] && !occl[f] {
                    f += 1;
                }
                runs.push((b, f));
            } else {
                f += 1;
            }
        }

        let mut corrected_runs = 0usize;
        let mut escalated_runs = 0usize;
        let mut occl_out = occl.clone();
        for &(b, e) in &runs {
            let anchored = b > 0
                && e < n
                && !occl[b - 1]
                && !misseg[b - 1]
                && !occl[e]
                && !misseg[e]
                && !missing[0][b - 1]
                && !missing[1][b - 1]
                && !missing[0][e]
                && !missing[1][e];
            let pos = if anchored {
                // Re-read after any flip from an earlier run.
                let c0 = self.fly_vec2(0, names::BODY_CENTROID)?;
                let c1 = self.fly_vec2(1, names::BODY_CENTROID)?;
                Some(misseg::run_pos_score([&c0, &c1], b - 1, e))
            } else {
                None
            };
            match misseg::decide_run(e - b, pos, cal.source_frame_rate, &cfg) {
                RunDecision::CorrectSwap => {
                    let mut mask = vec![false; n];
                    for m in &mut mask[b..] {
                        *m = true;
                    }
                    self.relabel_all(&mask)?;
                    corrected_runs += 1;
                    debug!(arena = self.index, begin = b, end = e, "missegmented run corrected");
                }
                RunDecision::KeepStraight => {}
                RunDecision::Escalate => {
                    for v in &mut occl_out[b..e] {
                        *v = true;
                    }
                    escalated_runs += 1;
                }
            }
        }

        // Write back flags.
        self.set_frame_bools(names::IS_MISSEGMENTED, &misseg)?;
        self.set_frame_bools(names::IS_OCCLUSION, &occl_out)?;

        info!(
            arena = self.index,
            runs = runs.len(),
            corrected = corrected_runs,
            escalated = escalated_runs,
            "missegmentation pass complete"
        );
        Ok(())
    }

    // ── stage 4: occlusion identity resolution ──────────────────────────

    pub fn resolve_occlusions(&mut self) -> Result<(), TrackingError> {
        self.require_normalized()?;
        let n = self.frame_count();
        let fc = self.calibration.fly_count;
        if fc > PAIR_FLY_COUNT {
            return Err(TrackingError::UnsupportedFlyCount { actual: fc });
        }

        let occl = self.frame_bools(names::IS_OCCLUSION)?;
        let mut partition = FramePartition::build(&occl);
        partition.validate()?;

        if fc == PAIR_FLY_COUNT {
            let misseg = self.frame_bools(names::IS_MISSEGMENTED)?;
            let missing = [
                self.fly_bools(0, names::MISSING)?,
                self.fly_bools(1, names::MISSING)?,
            ];
            let clean: Vec<bool> = (0..n)
                .map(|f| !occl[f] && !misseg[f] && !missing[0][f] && !missing[1][f])
                .collect();
            let c0 = self.fly_vec2(0, names::BODY_CENTROID)?;
            let c1 = self.fly_vec2(1, names::BODY_CENTROID)?;
            let a0 = self.fly_floats(0, names::BODY_AREA)?;
            let a1 = self.fly_floats(1, names::BODY_AREA)?;
            partition.score(
                [&c0, &c1],
                [&a0, &a1],
                &clean,
                &self.boc_records,
                &self.config.occlusion,
            );

            // Broadcast interval evidence onto per-frame channels.
            let mut s_size = vec![0.0f32; n];
            let mut s_comb = vec![0.0f32; n];
            let mut t_pos = vec![0.0f32; n];
            let mut t_mov = vec![0.0f32; n];
            let mut t_boc = vec![0.0f32; n];
            let mut t_comb = vec![0.0f32; n];
            let mut prob = vec![0.5f32; n];
            for seq in &partition.sequences {
                for f in seq.span.begin..seq.span.end {
                    s_size[f] = seq.s_size;
                    s_comb[f] = seq.s_combined;
                    prob[f] = logistic(seq.s_combined);
                }
            }
            for occ in &partition.occlusions {
                for f in occ.span.begin..occ.span.end {
                    t_pos[f] = occ.t_pos;
                    t_mov[f] = occ.t_mov;
                    t_boc[f] = occ.t_boc;
                    t_comb[f] = occ.t_logodd;
                    prob[f] = logistic(occ.t_logodd);
                }
            }
            let derived =
                |name: &str, unit: &'static str, v: Vec<f32>| {
                    Attribute::new(name, unit, AttributeClass::Derived, AttributeData::Float(v))
                };
            let fa = &mut self.frame_attrs.attrs;
            fa.insert(derived(names::S_SIZE, "score", s_size));
            fa.insert(derived(names::S_COMBINED, "logodd", s_comb));
            fa.insert(derived(names::T_POS, "score", t_pos));
            fa.insert(derived(names::T_MOV, "score", t_mov));
            fa.insert(derived(names::T_BOC, "score", t_boc));
            fa.insert(derived(names::T_COMBINED, "logodd", t_comb));
            fa.insert(derived(names::IDENTITY_PROBABILITY, "", prob));

            // Global decode and the single relabel application.
            let chain = partition.to_chain();
            let resolution = hofacker::resolve(&chain);
            let mask = partition.flip_mask(&resolution.anchor_flips);
            let flipped_frames = mask.iter().filter(|&&m| m).count();
            self.relabel_all(&mask)?;
            info!(
                arena = self.index,
                occlusions = partition.occlusions.len(),
                flipped_frames,
                evidence = resolution.evidence,
                "occlusion identities resolved"
            );
        } else {
            debug!(arena = self.index, "single-animal arena, no identity to resolve");
        }

        self.partition = Some(partition);
        Ok(())
    }

    // ── stage 5: interpolation ──────────────────────────────────────────

    pub fn interpolate(&mut self) -> Result<(), TrackingError> {
        self.require_normalized()?;
        let partition = self
            .partition
            .clone()
            .ok_or(TrackingError::StageOrder("interpolate before resolve_occlusions"))?;
        let n = self.frame_count();
        let fc = self.calibration.fly_count;
        let min_evidence = self.config.occlusion.min_size_evidence;

        let occl = self.frame_bools(names::IS_OCCLUSION)?;
        let misseg = self.frame_bools(names::IS_MISSEGMENTED)?;
        let missing: Vec<Vec<bool>> = (0..fc)
            .map(|i| self.fly_bools(i, names::MISSING))
            .collect::<Result<_, _>>()?;

        // Mean tracked centroid per frame, from pre-interpolation data.
        let tracked_centroids: Vec<Vec<[f32; 2]>> = (0..fc)
            .map(|i| self.fly_vec2(i, names::BODY_CENTROID))
            .collect::<Result<_, _>>()?;
        let mean: Vec<Option<[f32; 2]>> = (0..n)
            .map(|f| {
                let mut sum = [0.0f32; 2];
                let mut count = 0usize;
                for i in 0..fc {
                    if !missing[i][f] {
                        sum[0] += tracked_centroids[i][f][0];
                        sum[1] += tracked_centroids[i][f][1];
                        count += 1;
                    }
                }
                (count > 0).then(|| [sum[0] / count as f32, sum[1] / count as f32])
            })
            .collect();

        const LINEAR_ATTRS: [&str; 13] = [
            names::BODY_AREA,
            names::BODY_MAJOR_AXIS,
            names::BODY_MINOR_AXIS,
            names::BODY_ECCENTRICITY,
            names::WING_AREA,
            names::WING_AREA_FRONT_LEFT,
            names::WING_AREA_FRONT_RIGHT,
            names::WING_AREA_REAR_LEFT,
            names::WING_AREA_REAR_RIGHT,
            names::WING_ANGLE_FRONT_LEFT,
            names::WING_ANGLE_FRONT_RIGHT,
            names::WING_ANGLE_REAR_LEFT,
            names::WING_ANGLE_REAR_RIGHT,
        ];

        for i in 0..fc {
            let valid: Vec<bool> = (0..n)
                .map(|f| !occl[f] && !misseg[f] && !missing[i][f])
                .collect();
            let gaps = find_gaps(&valid);

            let map = self.fly_attrs.fly_mut(i);
            for name in LINEAR_ATTRS {
                let values = map.require_mut(name)?.as_float_mut()?;
                for gap in &gaps {
                    interpolate::fill_linear(values, gap);
                }
            }
            {
                let values = map.require_mut(names::BODY_ORIENTATION)?.as_float_mut()?;
                for gap in &gaps {
                    interpolate::fill_angular(values, gap);
                }
            }
            {
                let values = map.require_mut(names::BODY_CENTROID)?.as_vec2_mut()?;
                for gap in &gaps {
                    // Relative interpolation only for genuine occlusions
                    // with no size-channel evidence on either side.
                    let relative = gap.frames().any(|f| {
                        partition
                            .occlusion_at(f)
                            .map(|o| !partition.occlusion_has_size_evidence(o, min_evidence))
                            .unwrap_or(false)
                    });
                    if relative {
                        interpolate::fill_relative_vec2(values, &mean, gap);
                    } else {
                        interpolate::fill_linear_vec2(values, gap);
                    }
                }
            }

            let mut interpolated = vec![false; n];
            for gap in &gaps {
                for f in gap.frames() {
                    interpolated[f] = true;
                }
            }
            map.insert(Attribute::new(
                names::INTERPOLATED,
                "",
                AttributeClass::Derived,
                AttributeData::Bool(interpolated),
            ));
        }

        info!(arena = self.index, "interpolation complete");
        Ok(())
    }

    // ── stage 6: heading ────────────────────────────────────────────────

    pub fn resolve_heading(&mut self) -> Result<(), TrackingError> {
        self.require_normalized()?;
        let n = self.frame_count();
        let occl = self.frame_bools(names::IS_OCCLUSION)?;
        let misseg = self.frame_bools(names::IS_MISSEGMENTED)?;
        let clean: Vec<bool> = (0..n).map(|f| !occl[f] && !misseg[f]).collect();
        heading::resolve_heading(
            &mut self.fly_attrs,
            &clean,
            &self.calibration,
            &self.config.heading,
        )
    }

    // ── stage 7: behavior ───────────────────────────────────────────────

    pub fn derive_behavior(&mut self) -> Result<Vec<BoutEvent>, TrackingError> {
        self.require_normalized()?;
        behavior::derive_all(
            &mut self.fly_attrs,
            &mut self.pair_attrs,
            &mut self.frame_attrs,
            &self.calibration,
            &self.config.behavior,
        )
    }

    // ── shared plumbing ─────────────────────────────────────────────────

    /// The single doorway for identity flips across all three collections.
    pub fn relabel_all(&mut self, mask: &[bool]) -> Result<(), TrackingError> {
        self.frame_attrs.relabel(mask)?;
        self.fly_attrs.relabel(mask)?;
        self.pair_attrs.relabel(mask)?;
        Ok(())
    }

    /// Fraction of frames that are neither ambiguous nor missegmented.
    pub fn quality(&self) -> f32 {
        if !self.normalized {
            if self.frames.is_empty() {
                return 0.0;
            }
            let clean = self
                .frames
                .iter()
                .filter(|f| !f.is_occlusion_touched() && !f.is_missegmented)
                .count();
            return clean as f32 / self.frames.len() as f32;
        }
        let n = self.frame_count();
        if n == 0 {
            return 0.0;
        }
        let (Ok(occl), Ok(misseg)) = (
            self.frame_bools(names::IS_OCCLUSION),
            self.frame_bools(names::IS_MISSEGMENTED),
        ) else {
            return 0.0;
        };
        let clean = (0..n).filter(|&f| !occl[f] && !misseg[f]).count();
        clean as f32 / n as f32
    }

    pub fn frame_count(&self) -> usize {
        if self.normalized {
            self.frame_attrs
                .attrs
                .get(names::TRACKED_FLY_COUNT)
                .map(|a| a.len())
                .unwrap_or(0)
        } else {
            self.frames.len()
        }
    }

    pub fn export(&self, dir: &Path) -> Result<(), TrackingError> {
        export_attributes(dir, &self.frame_attrs, &self.fly_attrs, &self.pair_attrs)
    }

    fn validate_lengths(&self, frame_count: usize) -> Result<(), TrackingError> {
        self.frame_attrs.attrs.validate_lengths(frame_count)?;
        self.fly_attrs.validate_lengths(frame_count)?;
        self.pair_attrs.validate_lengths(frame_count)?;
        Ok(())
    }

    fn require_normalized(&self) -> Result<(), TrackingError> {
        if !self.normalized {
            return Err(TrackingError::StageOrder("normalize_tracking_data has not run"));
        }
        Ok(())
    }

    fn frame_bools(&self, name: &str) -> Result<Vec<bool>, TrackingError> {
        Ok(self.frame_attrs.attrs.require(name)?.as_bool()?.to_vec())
    }

    fn set_frame_bools(&mut self, name: &str, values: &[bool]) -> Result<(), TrackingError> {
        let slot = self.frame_attrs.attrs.require_mut(name)?.as_bool_mut()?;
        if slot.len() != values.len() {
            return Err(TrackingError::LengthMismatch {
                name: name.to_string(),
                expected: slot.len(),
                actual: values.len(),
            });
        }
        slot.copy_from_slice(values);
        Ok(())
    }

    fn fly_bools(&self, fly: usize, name: &str) -> Result<Vec<bool>, TrackingError> {
        Ok(self.fly_attrs.fly(fly).require(name)?.as_bool()?.to_vec())
    }

    fn fly_floats(&self, fly: usize, name: &str) -> Result<Vec<f32>, TrackingError> {
        Ok(self.fly_attrs.fly(fly).require(name)?.as_float()?.to_vec())
    }

    fn fly_vec2(&self, fly: usize, name: &str) -> Result<Vec<[f32; 2]>, TrackingError> {
        Ok(self.fly_attrs.fly(fly).require(name)?.as_vec2()?.to_vec())
    }
}

fn logistic(logodd: f32) -> f32 {
    1.0 / (1.0 + (-logodd).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imgproc::Gray;
    use crate::io::MemorySource;

    fn draw_disk(img: &mut Gray, cx: i64, cy: i64, r: i64, value: u8) {
        let (h, w) = img.dim();
        for y in (cy - r).max(0)..=(cy + r).min(h as i64 - 1) {
            for x in (cx - r).max(0)..=(cx + r).min(w as i64 - 1) {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                    let cell = &mut img[(y as usize, x as usize)];
                    *cell = (*cell).max(value);
                }
            }
        }
    }

    fn cal() -> Calibration {
        Calibration {
            pixel_per_millimeter: 10.0,
            source_frame_rate: 25.0,
            fly_count: 2,
        }
    }

    #[test]
    fn clean_pair_video_processes_end_to_end() {
        let frames: Vec<Gray> = (0..12)
            .map(|f| {
                let mut img = Gray::from_elem((60, 120), 0);
                draw_disk(&mut img, 25 + f, 30, 5, 200);
                draw_disk(&mut img, 90 - f, 30, 4, 200);
                img
            })
            .collect();
        let dir = tempfile::tempdir().unwrap();
        let mut arena = Arena::new(0, cal(), ArenaConfig::default());
        let mut source = MemorySource::new(frames);

        arena.process(&mut source, dir.path()).unwrap();

        assert_eq!(arena.frame_count(), 12);
        assert!((arena.quality() - 1.0).abs() < f32::EPSILON);
        let partition = arena.partition.as_ref().unwrap();
        assert!(partition.occlusions.is_empty());
        assert_eq!(partition.sequences.len(), 1);
        // Derived behavior channels exist.
        assert!(arena.frame_attrs.attrs.get(names::COURTSHIP).is_some());
        assert!(arena
            .pair_attrs
            .pair(0, 1)
            .get(names::DISTANCE_BODY_BODY)
            .is_some());
    }

    #[test]
    fn stage_order_is_enforced() {
        let mut arena = Arena::new(0, cal(), ArenaConfig::default());
        assert!(matches!(
            arena.resolve_occlusions(),
            Err(TrackingError::StageOrder(_))
        ));
        assert!(matches!(
            arena.normalize_tracking_data(),
            Err(TrackingError::NotTracked)
        ));
    }

    #[test]
    fn three_fly_arena_is_rejected_by_resolver() {
        let frames: Vec<Gray> = (0..3)
            .map(|_| {
                let mut img = Gray::from_elem((40, 120), 0);
                draw_disk(&mut img, 20, 20, 4, 200);
                draw_disk(&mut img, 60, 20, 4, 200);
                draw_disk(&mut img, 100, 20, 4, 200);
                img
            })
            .collect();
        let dir = tempfile::tempdir().unwrap();
        let mut arena = Arena::new(
            0,
            Calibration {
                pixel_per_millimeter: 10.0,
                source_frame_rate: 25.0,
                fly_count: 3,
            },
            ArenaConfig::default(),
        );
        let mut source = MemorySource::new(frames);
        arena.track(&mut source, dir.path()).unwrap();
        arena.normalize_tracking_data().unwrap();
        assert!(matches!(
            arena.resolve_occlusions(),
            Err(TrackingError::UnsupportedFlyCount { actual: 3 })
        ));
    }
}

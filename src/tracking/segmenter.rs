// src/tracking/segmenter.rs
//
// Converts one foreground mask into at most `known_fly_count` body+wing
// blob pairs.
//
// Pipeline per frame:
//   1. threshold body pixels, optional hole filling
//   2. threshold wing pixels at an adaptively saturated level, open,
//      reconstruction-fill from body seeds (every wing region keeps >= 1 body)
//   3. more wing regions than flies -> drop the smallest
//   4. greedily merge smallest bodies into their nearest same-wing sibling;
//      a body with no sibling is dropped and the frame flagged missegmented
//   5. a single merged body with two expected flies is split by a
//      morphological growth race seeded from the previous frame's
//      per-identity contour partition (occlusion carry)
//   6. a wing region holding two bodies is split the same way
//
// Failures are flags, never errors: the frame records whatever blobs
// exist and tracking continues.

use std::collections::VecDeque;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::arena::Calibration;
use super::fly::Fly;
use super::frame::TrackedFrame;
use crate::error::StoreError;
use crate::geometry::Point;
use crate::imgproc::{self, Gray, Mask, Region};
use crate::store::{ContourLog, HistogramLog};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Intensity at or above which a pixel is body.
    pub body_threshold: u8,
    /// Starting intensity for wing pixels; raised adaptively when the wing
    /// mask balloons (reflections, dirt on the arena floor).
    pub wing_threshold: u8,
    /// Saturation bound: wing area may not exceed this multiple of body area.
    pub max_wing_to_body_ratio: f32,
    /// Open iterations applied to the raw wing mask.
    pub wing_open_iterations: usize,
    /// Blobs below this physical area are specks, not flies.
    pub min_blob_area_mm2: f32,
    pub fill_body_holes: bool,
    /// Split a single merged body using the occlusion carry.
    pub split_merged_bodies: bool,
    /// Split a wing region shared by two bodies via growth race; when off,
    /// shared wing pixels fall to the nearest body centroid.
    pub split_shared_wings: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            body_threshold: 80,
            wing_threshold: 30,
            max_wing_to_body_ratio: 6.0,
            wing_open_iterations: 1,
            min_blob_area_mm2: 0.02,
            fill_body_holes: true,
            split_merged_bodies: true,
            split_shared_wings: true,
        }
    }
}

/// Result of segmenting one frame. Boundary point lists are handed to the
/// occlusion carry and freed with this struct; the frame itself only holds
/// contour-store handles.
pub struct SegmentedFrame {
    pub frame: TrackedFrame,
    pub fly_boundaries: Vec<Vec<Point>>,
}

pub fn segment_frame(
    index: usize,
    intensity: &Gray,
    known_fly_count: usize,
    split_seeds: Option<&[Vec<Point>; 2]>,
    cfg: &SegmentationConfig,
    cal: &Calibration,
    contours: &mut ContourLog,
    histograms: &mut HistogramLog,
) -> Result<SegmentedFrame, StoreError> {
    let dims = intensity.dim();
    let mut missegmented = false;

    // ── body mask ───────────────────────────────────────────────────────
    let mut body_mask = imgproc::threshold(intensity, cfg.body_threshold);
    if cfg.fill_body_holes {
        fill_holes(&mut body_mask);
    }
    let body_area = imgproc::count(&body_mask);

    // ── wing mask at adaptively saturated threshold ─────────────────────
    let mut wing_threshold = cfg.wing_threshold.min(cfg.body_threshold);
    let mut wing_mask = imgproc::threshold(intensity, wing_threshold);
    if body_area > 0 {
        let limit = cfg.max_wing_to_body_ratio * body_area as f32;
        while imgproc::count(&wing_mask) as f32 > limit && wing_threshold < u8::MAX - 2 {
            wing_threshold += 2;
            wing_mask = imgproc::threshold(intensity, wing_threshold);
        }
    }
    wing_mask = imgproc::open(&wing_mask, cfg.wing_open_iterations);
    wing_mask = imgproc::reconstruct(&body_mask, &wing_mask);
    // Bodies always belong to their wing region even if the open ate them.
    for (w, &b) in wing_mask.iter_mut().zip(body_mask.iter()) {
        *w = *w || b;
    }

    // ── wing regions: drop specks, then surplus smallest ────────────────
    let min_area_px = ((cfg.min_blob_area_mm2
        * cal.pixel_per_millimeter
        * cal.pixel_per_millimeter) as usize)
        .max(1);
    let mut wing_regions: Vec<Region> = imgproc::connected_components(&wing_mask)
        .into_iter()
        .filter(|r| r.area() >= min_area_px)
        .collect();
    if wing_regions.len() > known_fly_count {
        wing_regions.sort_by_key(|r| std::cmp::Reverse(r.area()));
        debug!(
            frame = index,
            dropped = wing_regions.len() - known_fly_count,
            "dropping smallest surplus wing regions"
        );
        wing_regions.truncate(known_fly_count);
    }

    let mut wing_label = Array2::<i32>::from_elem(dims, -1);
    for (li, region) in wing_regions.iter().enumerate() {
        for &(y, x) in &region.pixels {
            wing_label[(y, x)] = li as i32;
        }
    }

    // ── body regions inside kept wing regions ───────────────────────────
    let mut bodies: Vec<(Region, i32)> = imgproc::connected_components(&body_mask)
        .into_iter()
        .filter(|r| r.area() >= min_area_px)
        .filter_map(|r| {
            let label = wing_label[r.pixels[0]];
            (label >= 0).then_some((r, label))
        })
        .collect();

    // ── greedy merge down to the known fly count ────────────────────────
    while bodies.len() > known_fly_count {
        let smallest = bodies
            .iter()
            .enumerate()
            .min_by_key(|(_, (r, _))| r.area())
            .map(|(i, _)| i)
            .unwrap_or(0);
        let (small_region, small_label) = bodies.remove(smallest);
        let small_centroid = small_region.centroid();

        let target = bodies
            .iter()
            .enumerate()
            .filter(|(_, (_, l))| *l == small_label)
            .min_by(|(_, (a, _)), (_, (b, _))| {
                let da = crate::geometry::distance(a.centroid(), small_centroid);
                let db = crate::geometry::distance(b.centroid(), small_centroid);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i);

        match target {
            Some(i) => bodies[i].0.absorb(small_region),
            None => {
                // No same-wing sibling: the blob is dropped, not merged.
                debug!(frame = index, "unmergeable body blob dropped");
                missegmented = true;
            }
        }
    }

    // ── split a single merged body using the carry partition ────────────
    let mut split_applied = false;
    if bodies.len() == 1 && known_fly_count == 2 && cfg.split_merged_bodies {
        if let Some(seeds) = split_seeds {
            if !seeds[0].is_empty() && !seeds[1].is_empty() {
                let label = bodies[0].1;
                match race_from_points(&bodies[0].0.pixels, dims, [&seeds[0], &seeds[1]]) {
                    Some([a, b]) => {
                        bodies = vec![(Region { pixels: a }, label), (Region { pixels: b }, label)];
                        split_applied = true;
                    }
                    None => {
                        debug!(frame = index, "body growth-race split failed");
                        missegmented = true;
                    }
                }
            }
        }
    }

    // ── per-body wing pixel assignment (splitting shared regions) ───────
    let mut body_label = Array2::<i32>::from_elem(dims, -1);
    for (bi, (region, _)) in bodies.iter().enumerate() {
        for &(y, x) in &region.pixels {
            body_label[(y, x)] = bi as i32;
        }
    }
    let mut wing_only: Vec<Vec<(usize, usize)>> = vec![Vec::new(); bodies.len()];
    for region in &wing_regions {
        let members: Vec<usize> = bodies
            .iter()
            .enumerate()
            .filter(|(_, (r, _))| wing_label[r.pixels[0]] == wing_label[region.pixels[0]])
            .map(|(i, _)| i)
            .collect();
        let free: Vec<(usize, usize)> = region
            .pixels
            .iter()
            .copied()
            .filter(|&p| body_label[p] < 0)
            .collect();
        match members.len() {
            0 => {}
            1 => wing_only[members[0]].extend(free),
            _ => {
                let a = members[0];
                let b = members[1];
                let raced = if cfg.split_shared_wings {
                    race_from_members(
                        &region.pixels,
                        dims,
                        [&bodies[a].0.pixels, &bodies[b].0.pixels],
                    )
                } else {
                    None
                };
                match raced {
                    Some([wa, wb]) => {
                        wing_only[a].extend(wa.into_iter().filter(|&p| body_label[p] < 0));
                        wing_only[b].extend(wb.into_iter().filter(|&p| body_label[p] < 0));
                    }
                    None => {
                        // Nearest-centroid fallback.
                        let ca = bodies[a].0.centroid();
                        let cb = bodies[b].0.centroid();
                        for (y, x) in free {
                            let p = Point::new(x as f32, y as f32);
                            if crate::geometry::distance(p, ca)
                                <= crate::geometry::distance(p, cb)
                            {
                                wing_only[a].push((y, x));
                            } else {
                                wing_only[b].push((y, x));
                            }
                        }
                    }
                }
            }
        }
    }

    // ── assemble flies ──────────────────────────────────────────────────
    let mut flies = Vec::with_capacity(bodies.len());
    let mut fly_boundaries = Vec::with_capacity(bodies.len());
    for (bi, (region, _)) in bodies.iter().enumerate() {
        let (fly, boundary) = Fly::from_regions(
            region,
            &wing_only[bi],
            intensity,
            dims,
            split_applied,
            contours,
            histograms,
        )?;
        flies.push(fly);
        fly_boundaries.push(boundary);
    }

    Ok(SegmentedFrame {
        frame: TrackedFrame {
            index,
            flies,
            known_fly_count,
            is_missegmented: missegmented,
            body_threshold: cfg.body_threshold,
            wing_threshold,
        },
        fly_boundaries,
    })
}

/// Fill background holes fully enclosed by foreground: any background
/// component that does not touch the image border becomes foreground.
fn fill_holes(mask: &mut Mask) {
    let (h, w) = mask.dim();
    let mut border_seed = Mask::from_elem((h, w), false);
    for y in 0..h {
        for x in 0..w {
            let on_border = y == 0 || y == h - 1 || x == 0 || x == w - 1;
            border_seed[(y, x)] = on_border && !mask[(y, x)];
        }
    }
    let background = mask.map(|&v| !v);
    let outside = imgproc::reconstruct(&border_seed, &background);
    for ((m, &bg), &out) in mask.iter_mut().zip(background.iter()).zip(outside.iter()) {
        if bg && !out {
            *m = true;
        }
    }
}

/// Growth race seeded by external reference points: each identity starts
/// from the region pixel nearest to its point set, then both fronts expand
/// in lockstep until the region is consumed.
fn race_from_points(
    pixels: &[(usize, usize)],
    dims: (usize, usize),
    seeds: [&[Point]; 2],
) -> Option<[Vec<(usize, usize)>; 2]> {
    if pixels.len() < 2 {
        return None;
    }
    let mut start = [None::<(usize, usize)>; 2];
    for (id, seed) in seeds.iter().enumerate() {
        let mut best = f32::INFINITY;
        for &(y, x) in pixels {
            let p = Point::new(x as f32, y as f32);
            let d = seed
                .iter()
                .map(|s| crate::geometry::distance(p, *s))
                .fold(f32::INFINITY, f32::min);
            if d < best {
                best = d;
                start[id] = Some((y, x));
            }
        }
    }
    let (a, b) = (start[0]?, start[1]?);
    if a == b {
        return None;
    }
    lockstep_race(pixels, dims, [&[a][..], &[b][..]])
}

/// Growth race seeded by member pixel sets already inside the region.
fn race_from_members(
    pixels: &[(usize, usize)],
    dims: (usize, usize),
    seeds: [&[(usize, usize)]; 2],
) -> Option<[Vec<(usize, usize)>; 2]> {
    if seeds[0].is_empty() || seeds[1].is_empty() {
        return None;
    }
    lockstep_race(pixels, dims, seeds)
}

fn lockstep_race(
    pixels: &[(usize, usize)],
    dims: (usize, usize),
    seeds: [&[(usize, usize)]; 2],
) -> Option<[Vec<(usize, usize)>; 2]> {
    let mut member = Mask::from_elem(dims, false);
    for &p in pixels {
        member[p] = true;
    }
    let mut label = Array2::<i8>::from_elem(dims, -1);
    let mut frontiers: [VecDeque<(usize, usize)>; 2] = [VecDeque::new(), VecDeque::new()];
    for id in 0..2 {
        for &p in seeds[id] {
            if member[p] && label[p] < 0 {
                label[p] = id as i8;
                frontiers[id].push_back(p);
            }
        }
    }
    if frontiers[0].is_empty() || frontiers[1].is_empty() {
        return None;
    }

    let (h, w) = dims;
    while !frontiers[0].is_empty() || !frontiers[1].is_empty() {
        for id in 0..2 {
            // One full ring per identity per round keeps the race fair.
            let ring = frontiers[id].len();
            for _ in 0..ring {
                let Some((y, x)) = frontiers[id].pop_front() else {
                    break;
                };
                for (ny, nx) in crate::imgproc::neighbors8(y, x, h, w) {
                    if member[(ny, nx)] && label[(ny, nx)] < 0 {
                        label[(ny, nx)] = id as i8;
                        frontiers[id].push_back((ny, nx));
                    }
                }
            }
        }
    }

    let mut out: [Vec<(usize, usize)>; 2] = [Vec::new(), Vec::new()];
    for &p in pixels {
        match label[p] {
            0 => out[0].push(p),
            1 => out[1].push(p),
            _ => {}
        }
    }
    if out[0].is_empty() || out[1].is_empty() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration() -> Calibration {
        Calibration {
            pixel_per_millimeter: 10.0,
            source_frame_rate: 25.0,
            fly_count: 2,
        }
    }

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

    fn fly_blob(img: &mut Gray, cx: i64, cy: i64) {
        draw_disk(img, cx, cy, 7, 60); // wing halo
        draw_disk(img, cx, cy, 4, 200); // body core
    }

    fn logs(dir: &std::path::Path) -> (ContourLog, HistogramLog) {
        (
            ContourLog::create(&dir.join("c.bin")).unwrap(),
            HistogramLog::create(&dir.join("h.bin")).unwrap(),
        )
    }

    #[test]
    fn two_separate_blobs_become_two_flies() {
        let dir = tempfile::tempdir().unwrap();
        let (mut contours, mut histograms) = logs(dir.path());

        let mut img = Gray::from_elem((60, 100), 0);
        fly_blob(&mut img, 25, 30);
        fly_blob(&mut img, 70, 30);

        let out = segment_frame(
            0,
            &img,
            2,
            None,
            &SegmentationConfig::default(),
            &calibration(),
            &mut contours,
            &mut histograms,
        )
        .unwrap();

        assert_eq!(out.frame.flies.len(), 2);
        assert!(!out.frame.is_missegmented);
        assert!(!out.frame.is_occlusion_touched());
        for fly in &out.frame.flies {
            assert!(fly.body.area > 20.0);
            assert!(!fly.body_split);
        }
    }

    #[test]
    fn merged_blob_without_carry_is_occlusion() {
        let dir = tempfile::tempdir().unwrap();
        let (mut contours, mut histograms) = logs(dir.path());

        let mut img = Gray::from_elem((60, 100), 0);
        fly_blob(&mut img, 48, 30);
        fly_blob(&mut img, 56, 30); // overlapping halos and cores

        let out = segment_frame(
            0,
            &img,
            2,
            None,
            &SegmentationConfig::default(),
            &calibration(),
            &mut contours,
            &mut histograms,
        )
        .unwrap();

        assert_eq!(out.frame.flies.len(), 1);
        assert!(out.frame.is_occlusion_touched());
        assert!(!out.frame.is_missegmented);
    }

    #[test]
    fn merged_blob_with_carry_splits_into_two() {
        let dir = tempfile::tempdir().unwrap();
        let (mut contours, mut histograms) = logs(dir.path());

        let mut img = Gray::from_elem((60, 100), 0);
        fly_blob(&mut img, 48, 30);
        fly_blob(&mut img, 56, 30); // cores overlap into one body region

        // Carry contours from a hypothetical previous frame, one per side.
        let seeds = [
            vec![Point::new(42.0, 30.0)],
            vec![Point::new(62.0, 30.0)],
        ];

        let out = segment_frame(
            1,
            &img,
            2,
            Some(&seeds),
            &SegmentationConfig::default(),
            &calibration(),
            &mut contours,
            &mut histograms,
        )
        .unwrap();

        assert_eq!(out.frame.flies.len(), 2);
        assert!(out.frame.flies.iter().all(|f| f.body_split));
        // Split products still count as ambiguous frames.
        assert!(out.frame.is_occlusion_touched());
        let c0 = out.frame.flies[0].body.centroid;
        let c1 = out.frame.flies[1].body.centroid;
        assert!((c0.x - c1.x).abs() > 3.0, "split halves must separate in x");
        assert!(c0.x < c1.x, "blob order follows the seed identity order");
    }

    #[test]
    fn speck_noise_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (mut contours, mut histograms) = logs(dir.path());

        let mut img = Gray::from_elem((60, 100), 0);
        fly_blob(&mut img, 25, 30);
        fly_blob(&mut img, 70, 30);
        img[(5, 5)] = 255; // single hot pixel

        let out = segment_frame(
            0,
            &img,
            2,
            None,
            &SegmentationConfig::default(),
            &calibration(),
            &mut contours,
            &mut histograms,
        )
        .unwrap();
        assert_eq!(out.frame.flies.len(), 2);
    }

    #[test]
    fn adaptive_wing_threshold_saturates() {
        let dir = tempfile::tempdir().unwrap();
        let (mut contours, mut histograms) = logs(dir.path());

        // Flood the floor with low-level glare above the initial wing level.
        let mut img = Gray::from_elem((60, 100), 35);
        fly_blob(&mut img, 25, 30);
        fly_blob(&mut img, 70, 30);

        let out = segment_frame(
            0,
            &img,
            2,
            None,
            &SegmentationConfig::default(),
            &calibration(),
            &mut contours,
            &mut histograms,
        )
        .unwrap();
        assert!(
            out.frame.wing_threshold > SegmentationConfig::default().wing_threshold,
            "glare must push the wing threshold up"
        );
        assert_eq!(out.frame.flies.len(), 2);
    }
}

// tests/pipeline_scenarios.rs
//
// End-to-end pipeline scenarios over synthetic mask sequences. Flies are
// drawn as bright body disks (and dimmer wing halos where wings matter);
// the full stage chain runs exactly as the binary drives it.

use fly_courtship_tracking::attributes::{names, Relabel};
use fly_courtship_tracking::behavior::{self, BehaviorConfig};
use fly_courtship_tracking::imgproc::Gray;
use fly_courtship_tracking::io::MemorySource;
use fly_courtship_tracking::tracking::{Arena, ArenaConfig, Calibration};

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

fn calibration() -> Calibration {
    Calibration {
        pixel_per_millimeter: 10.0,
        source_frame_rate: 25.0,
        fly_count: 2,
    }
}

/// Fly A is drawn with r=6 (~113 px^2), fly B with r=4 (~50 px^2): a clear
/// 2x size asymmetry inside the calibrated bounds.
const R_BIG: i64 = 6;
const R_SMALL: i64 = 4;

#[test]
fn scenario_no_occlusion_yields_empty_occlusion_map() {
    let frames: Vec<Gray> = (0..100)
        .map(|_| {
            let mut img = Gray::from_elem((60, 120), 0);
            draw_disk(&mut img, 30, 30, R_BIG, 200);
            draw_disk(&mut img, 85, 30, R_SMALL, 200);
            img
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let mut arena = Arena::new(0, calibration(), ArenaConfig::default());
    let mut source = MemorySource::new(frames);
    arena.process(&mut source, dir.path()).unwrap();

    let partition = arena.partition.as_ref().unwrap();
    assert!(partition.occlusions.is_empty(), "no occlusion intervals expected");
    assert_eq!(partition.sequences.len(), 1);
    assert_eq!(partition.sequences[0].span.begin, 0);
    assert_eq!(partition.sequences[0].span.end, 100);

    let perm = arena
        .frame_attrs
        .attrs
        .require(names::ID_PERMUTATION)
        .unwrap()
        .as_bool()
        .unwrap();
    assert!(perm.iter().all(|&p| !p), "identity permutation must be all-zero");
    assert!((arena.quality() - 1.0).abs() < 1e-6);
}

#[test]
fn scenario_size_asymmetry_resolves_occlusion_without_flip() {
    // Frames 40..50 merge both flies into one blob near the middle; the
    // flies return to their original sides afterwards.
    let frames: Vec<Gray> = (0..100)
        .map(|f| {
            let mut img = Gray::from_elem((60, 120), 0);
            if (40..50).contains(&f) {
                draw_disk(&mut img, 55, 30, R_BIG, 200);
                draw_disk(&mut img, 63, 30, R_SMALL, 200);
            } else {
                draw_disk(&mut img, 30, 30, R_BIG, 200);
                draw_disk(&mut img, 85, 30, R_SMALL, 200);
            }
            img
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let mut arena = Arena::new(0, calibration(), ArenaConfig::default());
    let mut source = MemorySource::new(frames);
    arena.process(&mut source, dir.path()).unwrap();

    let partition = arena.partition.as_ref().unwrap();
    assert_eq!(partition.occlusions.len(), 1);
    let occ = &partition.occlusions[0];
    assert_eq!((occ.span.begin, occ.span.end), (40, 50));

    // Identity held across the occlusion: permutation unchanged.
    let perm = arena
        .frame_attrs
        .attrs
        .require(names::ID_PERMUTATION)
        .unwrap()
        .as_bool()
        .unwrap();
    assert!(perm.iter().all(|&p| !p), "no flip expected: {perm:?}");

    // Size evidence matches the drawn asymmetry (fly 0 is the big one).
    let s_size = arena
        .frame_attrs
        .attrs
        .require(names::S_SIZE)
        .unwrap()
        .as_float()
        .unwrap();
    let s_combined = arena
        .frame_attrs
        .attrs
        .require(names::S_COMBINED)
        .unwrap()
        .as_float()
        .unwrap();
    assert!(s_size[0] > 0.9, "sSize = {}", s_size[0]);
    assert!(s_size[99] > 0.9);
    assert!(s_combined[0] > 0.0);
    assert!(s_combined[99] > 0.0);

    // Fly 0 stays the larger fly on both sides of the occlusion.
    let area0 = arena
        .fly_attrs
        .fly(0)
        .require(names::BODY_AREA)
        .unwrap()
        .as_float()
        .unwrap();
    let area1 = arena
        .fly_attrs
        .fly(1)
        .require(names::BODY_AREA)
        .unwrap()
        .as_float()
        .unwrap();
    assert!(area0[0] > area1[0]);
    assert!(area0[99] > area1[99]);
}

#[test]
fn scenario_swapped_exit_is_flipped_back_by_size_evidence() {
    // Same occlusion, but the flies exit on exchanged sides. Position
    // continuity then matches the small fly into slot 0, and only the
    // size channel can restore global identity.
    let frames: Vec<Gray> = (0..100)
        .map(|f| {
            let mut img = Gray::from_elem((60, 120), 0);
            if (40..50).contains(&f) {
                draw_disk(&mut img, 55, 30, R_BIG, 200);
                draw_disk(&mut img, 63, 30, R_SMALL, 200);
            } else if f < 40 {
                draw_disk(&mut img, 30, 30, R_BIG, 200);
                draw_disk(&mut img, 85, 30, R_SMALL, 200);
            } else {
                draw_disk(&mut img, 85, 30, R_BIG, 200);
                draw_disk(&mut img, 30, 30, R_SMALL, 200);
            }
            img
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let mut arena = Arena::new(0, calibration(), ArenaConfig::default());
    let mut source = MemorySource::new(frames);
    arena.process(&mut source, dir.path()).unwrap();

    // After resolution fly 0 must be the large fly on both sides, which
    // means it sits at x~85 in the tail of the video.
    let area0 = arena
        .fly_attrs
        .fly(0)
        .require(names::BODY_AREA)
        .unwrap()
        .as_float()
        .unwrap();
    let area1 = arena
        .fly_attrs
        .fly(1)
        .require(names::BODY_AREA)
        .unwrap()
        .as_float()
        .unwrap();
    assert!(area0[10] > area1[10]);
    assert!(area0[90] > area1[90], "size rank must hold after the occlusion");

    let c0 = arena
        .fly_attrs
        .fly(0)
        .require(names::BODY_CENTROID)
        .unwrap()
        .as_vec2()
        .unwrap();
    assert!(c0[10][0] < 50.0);
    assert!(c0[90][0] > 50.0, "big fly moved to the right side");

    // The permutation bit records the applied flip on the tail frames.
    let perm = arena
        .frame_attrs
        .attrs
        .require(names::ID_PERMUTATION)
        .unwrap()
        .as_bool()
        .unwrap();
    assert!(!perm[10]);
    assert!(perm[90], "tail sequence must be recorded as flipped");
}

#[test]
fn scenario_wing_extension_bout_survives_persistence() {
    use fly_courtship_tracking::attributes::{
        Attribute, AttributeClass, AttributeData, FlyAttributes, FrameAttributes, PairAttributes,
    };

    let n = 125; // 5 s at 25 fps
    let cal = calibration();
    let mut flies = FlyAttributes::new(2);
    for i in 0..2 {
        let map = flies.fly_mut(i);
        map.insert(Attribute::new(
            names::BODY_CENTROID,
            "px",
            AttributeClass::Tracked,
            AttributeData::Vec2(vec![[60.0 + 400.0 * i as f32, 40.0]; n]),
        ));
        for (name, value) in [
            (names::BODY_ORIENTATION, 0.0f32),
            (names::BODY_MAJOR_AXIS, 8.0),
            (names::BODY_MINOR_AXIS, 4.0),
            (names::LEFT_WING_ANGLE, 0.0),
            (names::RIGHT_WING_ANGLE, 0.0),
            (names::LEFT_WING_AREA, 0.0),
            (names::RIGHT_WING_AREA, 0.0),
        ] {
            map.insert(Attribute::new(
                name,
                "",
                AttributeClass::Tracked,
                AttributeData::Float(vec![value; n]),
            ));
        }
    }

    // Fly 0: left wing beyond threshold for exactly 1 s, silence around it.
    {
        let map = flies.fly_mut(0);
        let mut angle = vec![0.0f32; n];
        let mut area = vec![0.0f32; n];
        for f in 50..75 {
            angle[f] = 55f32.to_radians();
            area[f] = 20.0;
        }
        map.insert(Attribute::new(
            names::LEFT_WING_ANGLE,
            "rad",
            AttributeClass::Tracked,
            AttributeData::Float(angle),
        ));
        map.insert(Attribute::new(
            names::LEFT_WING_AREA,
            "px^2",
            AttributeClass::Tracked,
            AttributeData::Float(area),
        ));
    }

    let mut pairs = PairAttributes::new(2);
    let mut frames = FrameAttributes::new();
    let mut cfg = BehaviorConfig::default();
    cfg.wing_extension.persistence_seconds = 0.5;

    let bouts =
        behavior::derive_all(&mut flies, &mut pairs, &mut frames, &cal, &cfg).unwrap();

    let wing_bouts: Vec<_> = bouts
        .iter()
        .filter(|b| b.behavior == names::WING_EXT_LEFT && b.active_fly == 0)
        .collect();
    assert_eq!(wing_bouts.len(), 1, "exactly one bout expected: {bouts:?}");
    assert!(
        wing_bouts[0].seconds >= 0.5,
        "erosion/dilation must not shorten a 1 s bout below the 0.5 s persistence window"
    );
}

#[test]
fn relabel_with_all_false_mask_is_identity() {
    let frames: Vec<Gray> = (0..30)
        .map(|f| {
            let mut img = Gray::from_elem((60, 120), 0);
            if (12..18).contains(&f) {
                draw_disk(&mut img, 55, 30, R_BIG, 200);
                draw_disk(&mut img, 63, 30, R_SMALL, 200);
            } else {
                draw_disk(&mut img, 30, 30, R_BIG, 200);
                draw_disk(&mut img, 85, 30, R_SMALL, 200);
            }
            img
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let mut arena = Arena::new(0, calibration(), ArenaConfig::default());
    let mut source = MemorySource::new(frames);
    arena.process(&mut source, dir.path()).unwrap();

    let area_before: Vec<f32> = arena
        .fly_attrs
        .fly(0)
        .require(names::BODY_AREA)
        .unwrap()
        .as_float()
        .unwrap()
        .to_vec();
    let s_before: Vec<f32> = arena
        .frame_attrs
        .attrs
        .require(names::S_SIZE)
        .unwrap()
        .as_float()
        .unwrap()
        .to_vec();

    let mask = vec![false; arena.frame_count()];
    arena.fly_attrs.relabel(&mask).unwrap();
    arena.frame_attrs.relabel(&mask).unwrap();
    arena.pair_attrs.relabel(&mask).unwrap();

    assert_eq!(
        arena
            .fly_attrs
            .fly(0)
            .require(names::BODY_AREA)
            .unwrap()
            .as_float()
            .unwrap(),
        area_before.as_slice()
    );
    assert_eq!(
        arena
            .frame_attrs
            .attrs
            .require(names::S_SIZE)
            .unwrap()
            .as_float()
            .unwrap(),
        s_before.as_slice()
    );
}

#[test]
fn interpolation_fills_occluded_gap_without_touching_anchors() {
    let frames: Vec<Gray> = (0..60)
        .map(|f| {
            let mut img = Gray::from_elem((60, 120), 0);
            if (20..30).contains(&f) {
                draw_disk(&mut img, 55, 30, R_BIG, 200);
                draw_disk(&mut img, 63, 30, R_SMALL, 200);
            } else {
                draw_disk(&mut img, 30, 30, R_BIG, 200);
                draw_disk(&mut img, 85, 30, R_SMALL, 200);
            }
            img
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let mut arena = Arena::new(0, calibration(), ArenaConfig::default());
    let mut source = MemorySource::new(frames);
    arena.process(&mut source, dir.path()).unwrap();

    let interp = arena
        .fly_attrs
        .fly(1)
        .require(names::INTERPOLATED)
        .unwrap()
        .as_bool()
        .unwrap();
    assert!(!interp[19], "anchor before the gap stays tracked");
    assert!(!interp[30], "anchor after the gap stays tracked");
    assert!(interp[20..30].iter().all(|&v| v), "gap frames are interpolated");

    // Interpolated areas lie between the anchor values.
    let area1 = arena
        .fly_attrs
        .fly(1)
        .require(names::BODY_AREA)
        .unwrap()
        .as_float()
        .unwrap();
    let (lo, hi) = (
        area1[19].min(area1[30]) - 1e-3,
        area1[19].max(area1[30]) + 1e-3,
    );
    for f in 20..30 {
        assert!(
            area1[f] >= lo && area1[f] <= hi,
            "frame {f}: {} outside [{lo}, {hi}]",
            area1[f]
        );
    }
}

// src/behavior/events.rs
//
// Behavior predicates and courtship scoring. All thresholds are physical
// (mm, mm/s, degrees, seconds) and converted through the arena calibration
// at derivation time, so one config serves arenas filmed at different
// scales and frame rates.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::filters::{median_filter_bool, odd_window, open_runs};
use crate::attributes::{
    names, Attribute, AttributeClass, AttributeData, FlyAttributes, FrameAttributes,
    PairAttributes,
};
use crate::error::TrackingError;
use crate::geometry::{angle_difference, ray_intersects_ellipse, EllipseFit, Point, Vector};
use crate::tracking::Calibration;

/// Cutoff on the weighted courtship sum. Fixed, not configurable: any
/// nonzero contribution from a single weighted predicate should count.
const COURTING_CUTOFF: f32 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CirclingConfig {
    pub max_distance_mm: f32,
    pub min_speed_mm_per_s: f32,
    pub max_angle_to_other_deg: f32,
    /// Half-width of the sideways band around 90 degrees between motion
    /// direction and body axis.
    pub sideways_band_deg: f32,
    pub median_seconds: f32,
    pub persistence_seconds: f32,
}

impl Default for CirclingConfig {
    fn default() -> Self {
        Self {
            max_distance_mm: 5.0,
            min_speed_mm_per_s: 3.0,
            max_angle_to_other_deg: 90.0,
            sideways_band_deg: 30.0,
            median_seconds: 0.12,
            persistence_seconds: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowingConfig {
    pub max_distance_mm: f32,
    pub min_speed_mm_per_s: f32,
    /// Motion directions of the two flies must agree within this angle.
    pub max_motion_angle_deg: f32,
    pub max_angle_to_other_deg: f32,
    pub median_seconds: f32,
    pub persistence_seconds: f32,
}

impl Default for FollowingConfig {
    fn default() -> Self {
        Self {
            max_distance_mm: 6.0,
            min_speed_mm_per_s: 2.0,
            max_motion_angle_deg: 45.0,
            max_angle_to_other_deg: 60.0,
            median_seconds: 0.12,
            persistence_seconds: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientingConfig {
    pub max_distance_mm: f32,
    /// The orienting fly stands still.
    pub max_speed_mm_per_s: f32,
    pub max_angle_to_other_deg: f32,
    pub median_seconds: f32,
    pub persistence_seconds: f32,
}

impl Default for OrientingConfig {
    fn default() -> Self {
        Self {
            max_distance_mm: 8.0,
            max_speed_mm_per_s: 1.5,
            max_angle_to_other_deg: 30.0,
            median_seconds: 0.12,
            persistence_seconds: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RayEllipseConfig {
    pub max_distance_mm: f32,
    pub median_seconds: f32,
    pub persistence_seconds: f32,
}

impl Default for RayEllipseConfig {
    fn default() -> Self {
        Self {
            max_distance_mm: 10.0,
            median_seconds: 0.12,
            persistence_seconds: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WingExtensionConfig {
    pub min_angle_deg: f32,
    pub min_area_mm2: f32,
    pub median_seconds: f32,
    pub persistence_seconds: f32,
}

impl Default for WingExtensionConfig {
    fn default() -> Self {
        Self {
            min_angle_deg: 35.0,
            min_area_mm2: 0.05,
            median_seconds: 0.12,
            persistence_seconds: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopulationConfig {
    pub max_distance_mm: f32,
    pub max_speed_mm_per_s: f32,
    pub median_seconds: f32,
    pub persistence_seconds: f32,
}

impl Default for CopulationConfig {
    fn default() -> Self {
        Self {
            max_distance_mm: 1.5,
            max_speed_mm_per_s: 1.0,
            median_seconds: 0.5,
            persistence_seconds: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CourtshipWeights {
    pub circling: f32,
    pub following: f32,
    pub orienting: f32,
    pub ray_ellipse_orienting: f32,
    pub wing_extension: f32,
    pub copulation: f32,
}

impl Default for CourtshipWeights {
    fn default() -> Self {
        Self {
            circling: 0.3,
            following: 0.2,
            orienting: 0.2,
            ray_ellipse_orienting: 0.2,
            wing_extension: 0.5,
            copulation: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub circling: CirclingConfig,
    pub following: FollowingConfig,
    pub orienting: OrientingConfig,
    pub ray_ellipse: RayEllipseConfig,
    pub wing_extension: WingExtensionConfig,
    pub copulation: CopulationConfig,
    pub courtship: CourtshipWeights,
}

/// One contiguous true-run of a behavior series.
#[derive(Debug, Clone, Serialize)]
pub struct BoutEvent {
    pub behavior: String,
    pub active_fly: usize,
    pub passive_fly: Option<usize>,
    pub begin_frame: usize,
    pub end_frame: usize,
    pub seconds: f32,
}

/// Cloned per-fly geometry the predicates read from.
struct FlyView {
    centroid: Vec<[f32; 2]>,
    orientation: Vec<f32>,
    semi_major: Vec<f32>,
    semi_minor: Vec<f32>,
    speed: Vec<f32>,
    moving_dir: Vec<f32>,
    left_wing_angle: Vec<f32>,
    right_wing_angle: Vec<f32>,
    left_wing_area: Vec<f32>,
    right_wing_area: Vec<f32>,
}

impl FlyView {
    fn point(&self, f: usize) -> Point {
        Point::new(self.centroid[f][0], self.centroid[f][1])
    }

    fn body_ellipse(&self, f: usize) -> EllipseFit {
        EllipseFit {
            centroid: self.point(f),
            semi_major: self.semi_major[f],
            semi_minor: self.semi_minor[f],
            orientation: self.orientation[f],
            area: 0.0,
        }
    }
}

pub fn derive_all(
    flies: &mut FlyAttributes,
    pairs: &mut PairAttributes,
    frames: &mut FrameAttributes,
    cal: &Calibration,
    cfg: &BehaviorConfig,
) -> Result<Vec<BoutEvent>, TrackingError> {
    let fly_count = flies.fly_count();
    if fly_count == 0 {
        return Ok(Vec::new());
    }
    let fps = cal.source_frame_rate;

    // ── kinematics pass ─────────────────────────────────────────────────
    let mut views = Vec::with_capacity(fly_count);
    for i in 0..fly_count {
        let view = build_view(flies, i)?;
        let map = flies.fly_mut(i);
        let n = view.centroid.len();
        let velocity: Vec<[f32; 2]> = (0..n)
            .map(|f| central_velocity(&view.centroid, f))
            .collect();
        map.insert(Attribute::new(
            names::VELOCITY,
            "px/frame",
            AttributeClass::Derived,
            AttributeData::Vec2(velocity),
        ));
        map.insert(Attribute::new(
            names::SPEED,
            "px/frame",
            AttributeClass::Derived,
            AttributeData::Float(view.speed.clone()),
        ));
        map.insert(Attribute::new(
            names::MOVING_DIRECTION,
            "rad",
            AttributeClass::Derived,
            AttributeData::Float(view.moving_dir.clone()),
        ));
        views.push(view);
    }
    let n = views[0].centroid.len();

    let mut bouts = Vec::new();

    // ── wing extension, per fly ─────────────────────────────────────────
    let min_angle = cfg.wing_extension.min_angle_deg.to_radians();
    let min_area = cal.mm2_to_px2(cfg.wing_extension.min_area_mm2);
    let median_w = odd_window(cfg.wing_extension.median_seconds, fps);
    let persist_w = odd_window(cfg.wing_extension.persistence_seconds, fps);
    let mut wing_ext_by_fly = Vec::with_capacity(fly_count);
    for (i, view) in views.iter().enumerate() {
        let left_raw: Vec<bool> = (0..n)
            .map(|f| view.left_wing_angle[f] >= min_angle && view.left_wing_area[f] >= min_area)
            .collect();
        let right_raw: Vec<bool> = (0..n)
            .map(|f| view.right_wing_angle[f] >= min_angle && view.right_wing_area[f] >= min_area)
            .collect();
        let left = open_runs(&median_filter_bool(&left_raw, median_w), persist_w);
        let right = open_runs(&median_filter_bool(&right_raw, median_w), persist_w);
        let both: Vec<bool> = (0..n).map(|f| left[f] || right[f]).collect();

        bouts.extend(extract_bouts(names::WING_EXT_LEFT, i, None, &left, fps));
        bouts.extend(extract_bouts(names::WING_EXT_RIGHT, i, None, &right, fps));
        bouts.extend(extract_bouts(names::WING_EXT, i, None, &both, fps));

        let map = flies.fly_mut(i);
        insert_bool(map, names::WING_EXT_LEFT, left);
        insert_bool(map, names::WING_EXT_RIGHT, right);
        insert_bool(map, names::WING_EXT, both);
        wing_ext_by_fly.push(
            map.require(names::WING_EXT)?.as_bool()?.to_vec(),
        );
    }

    // ── pair predicates ─────────────────────────────────────────────────
    let mut courting_sum: Vec<Vec<f32>> = vec![vec![0.0; n]; fly_count];
    for (i, wing_ext) in wing_ext_by_fly.iter().enumerate() {
        for f in 0..n {
            if wing_ext[f] {
                courting_sum[i][f] += cfg.courtship.wing_extension;
            }
        }
    }

    if fly_count == 2 {
        for (active, passive) in [(0usize, 1usize), (1usize, 0usize)] {
            let a = &views[active];
            let p = &views[passive];

            let distance: Vec<f32> = (0..n)
                .map(|f| crate::geometry::distance(a.point(f), p.point(f)))
                .collect();
            let angle_to_other: Vec<f32> = (0..n)
                .map(|f| {
                    let d = p.point(f) - a.point(f);
                    angle_difference(d.y.atan2(d.x), a.orientation[f])
                })
                .collect();

            let circling = derive_circling(a, &distance, &angle_to_other, cal, &cfg.circling, n);
            let following =
                derive_following(a, p, &distance, &angle_to_other, cal, &cfg.following, n);
            let orienting = derive_orienting(a, &distance, &angle_to_other, cal, &cfg.orienting, n);
            let ray = derive_ray_ellipse(a, p, &distance, cal, &cfg.ray_ellipse, n);
            let copulation = derive_copulation(a, p, &distance, cal, &cfg.copulation, n);

            for f in 0..n {
                let w = &cfg.courtship;
                let mut sum = 0.0;
                if circling[f] {
                    sum += w.circling;
                }
                if following[f] {
                    sum += w.following;
                }
                if orienting[f] {
                    sum += w.orienting;
                }
                if ray[f] {
                    sum += w.ray_ellipse_orienting;
                }
                if copulation[f] {
                    sum += w.copulation;
                }
                courting_sum[active][f] += sum;
            }

            for (name, series) in [
                (names::CIRCLING, &circling),
                (names::FOLLOWING, &following),
                (names::ORIENTING, &orienting),
                (names::RAY_ELLIPSE_ORIENTING, &ray),
                (names::COPULATION, &copulation),
            ] {
                bouts.extend(extract_bouts(name, active, Some(passive), series, fps));
            }

            let map = pairs.pair_mut(active, passive);
            map.insert(Attribute::new(
                names::DISTANCE_BODY_BODY,
                "px",
                AttributeClass::Derived,
                AttributeData::Float(distance),
            ));
            map.insert(Attribute::new(
                names::ANGLE_TO_OTHER,
                "rad",
                AttributeClass::Derived,
                AttributeData::Float(angle_to_other),
            ));
            insert_bool(map, names::CIRCLING, circling);
            insert_bool(map, names::FOLLOWING, following);
            insert_bool(map, names::ORIENTING, orienting);
            insert_bool(map, names::RAY_ELLIPSE_ORIENTING, ray);
            insert_bool(map, names::COPULATION, copulation);
        }
    }

    // ── courtship score ─────────────────────────────────────────────────
    let mut courtship = vec![false; n];
    for i in 0..fly_count {
        let courting: Vec<bool> = (0..n).map(|f| courting_sum[i][f] > COURTING_CUTOFF).collect();
        for f in 0..n {
            courtship[f] = courtship[f] || courting[f];
        }
        bouts.extend(extract_bouts(names::COURTING, i, None, &courting, fps));
        insert_bool(flies.fly_mut(i), names::COURTING, courting);
    }
    frames.attrs.insert(Attribute::new(
        names::COURTSHIP,
        "",
        AttributeClass::Derived,
        AttributeData::Bool(courtship),
    ));

    info!(bouts = bouts.len(), "behavior derivation complete");
    Ok(bouts)
}

fn derive_circling(
    a: &FlyView,
    distance: &[f32],
    angle_to_other: &[f32],
    cal: &Calibration,
    cfg: &CirclingConfig,
    n: usize,
) -> Vec<bool> {
    let max_dist = cal.mm_to_px(cfg.max_distance_mm);
    let min_speed = cal.mm_per_s_to_px_per_frame(cfg.min_speed_mm_per_s);
    let max_angle = cfg.max_angle_to_other_deg.to_radians();
    let band = cfg.sideways_band_deg.to_radians();

    let subs = vec![
        (0..n).map(|f| distance[f] <= max_dist).collect(),
        (0..n).map(|f| a.speed[f] >= min_speed).collect(),
        (0..n).map(|f| angle_to_other[f].abs() <= max_angle).collect(),
        (0..n)
            .map(|f| {
                let d = angle_difference(a.moving_dir[f], a.orientation[f]).abs();
                (d - std::f32::consts::FRAC_PI_2).abs() <= band
            })
            .collect(),
    ];
    combine(subs, cfg.median_seconds, cfg.persistence_seconds, cal)
}

fn derive_following(
    a: &FlyView,
    p: &FlyView,
    distance: &[f32],
    angle_to_other: &[f32],
    cal: &Calibration,
    cfg: &FollowingConfig,
    n: usize,
) -> Vec<bool> {
    let max_dist = cal.mm_to_px(cfg.max_distance_mm);
    let min_speed = cal.mm_per_s_to_px_per_frame(cfg.min_speed_mm_per_s);
    let max_motion = cfg.max_motion_angle_deg.to_radians();
    let max_angle = cfg.max_angle_to_other_deg.to_radians();

    let subs = vec![
        (0..n).map(|f| distance[f] <= max_dist).collect(),
        (0..n).map(|f| a.speed[f] >= min_speed).collect(),
        (0..n)
            .map(|f| angle_difference(a.moving_dir[f], p.moving_dir[f]).abs() <= max_motion)
            .collect(),
        (0..n).map(|f| angle_to_other[f].abs() <= max_angle).collect(),
    ];
    combine(subs, cfg.median_seconds, cfg.persistence_seconds, cal)
}

fn derive_orienting(
    a: &FlyView,
    distance: &[f32],
    angle_to_other: &[f32],
    cal: &Calibration,
    cfg: &OrientingConfig,
    n: usize,
) -> Vec<bool> {
    let max_dist = cal.mm_to_px(cfg.max_distance_mm);
    let max_speed = cal.mm_per_s_to_px_per_frame(cfg.max_speed_mm_per_s);
    let max_angle = cfg.max_angle_to_other_deg.to_radians();

    let subs = vec![
        (0..n).map(|f| distance[f] <= max_dist).collect(),
        (0..n).map(|f| a.speed[f] <= max_speed).collect(),
        (0..n).map(|f| angle_to_other[f].abs() <= max_angle).collect(),
    ];
    combine(subs, cfg.median_seconds, cfg.persistence_seconds, cal)
}

fn derive_ray_ellipse(
    a: &FlyView,
    p: &FlyView,
    distance: &[f32],
    cal: &Calibration,
    cfg: &RayEllipseConfig,
    n: usize,
) -> Vec<bool> {
    let max_dist = cal.mm_to_px(cfg.max_distance_mm);

    let subs = vec![
        (0..n).map(|f| distance[f] <= max_dist).collect(),
        (0..n)
            .map(|f| {
                let dir = Vector::new(a.orientation[f].cos(), a.orientation[f].sin());
                // Cast from the head end of the body, not the centroid.
                let origin = a.point(f) + dir * a.semi_major[f];
                ray_intersects_ellipse(origin, dir, &p.body_ellipse(f))
            })
            .collect(),
    ];
    combine(subs, cfg.median_seconds, cfg.persistence_seconds, cal)
}

fn derive_copulation(
    a: &FlyView,
    p: &FlyView,
    distance: &[f32],
    cal: &Calibration,
    cfg: &CopulationConfig,
    n: usize,
) -> Vec<bool> {
    let max_dist = cal.mm_to_px(cfg.max_distance_mm);
    let max_speed = cal.mm_per_s_to_px_per_frame(cfg.max_speed_mm_per_s);

    let subs = vec![
        (0..n).map(|f| distance[f] <= max_dist).collect(),
        (0..n)
            .map(|f| a.speed[f] <= max_speed && p.speed[f] <= max_speed)
            .collect(),
    ];
    combine(subs, cfg.median_seconds, cfg.persistence_seconds, cal)
}

fn combine(
    subs: Vec<Vec<bool>>,
    median_seconds: f32,
    persistence_seconds: f32,
    cal: &Calibration,
) -> Vec<bool> {
    let median_w = odd_window(median_seconds, cal.source_frame_rate);
    let persist_w = odd_window(persistence_seconds, cal.source_frame_rate);
    let n = subs.first().map(Vec::len).unwrap_or(0);
    let mut anded = vec![true; n];
    for sub in &subs {
        let filtered = median_filter_bool(sub, median_w);
        for f in 0..n {
            anded[f] = anded[f] && filtered[f];
        }
    }
    open_runs(&anded, persist_w)
}

fn extract_bouts(
    behavior: &str,
    active: usize,
    passive: Option<usize>,
    series: &[bool],
    fps: f32,
) -> Vec<BoutEvent> {
    let mut bouts = Vec::new();
    let mut begin: Option<usize> = None;
    for (f, &v) in series.iter().enumerate() {
        match (v, begin) {
            (true, None) => begin = Some(f),
            (false, Some(b)) => {
                bouts.push(BoutEvent {
                    behavior: behavior.to_string(),
                    active_fly: active,
                    passive_fly: passive,
                    begin_frame: b,
                    end_frame: f,
                    seconds: (f - b) as f32 / fps,
                });
                begin = None;
            }
            _ => {}
        }
    }
    if let Some(b) = begin {
        bouts.push(BoutEvent {
            behavior: behavior.to_string(),
            active_fly: active,
            passive_fly: passive,
            begin_frame: b,
            end_frame: series.len(),
            seconds: (series.len() - b) as f32 / fps,
        });
    }
    if !bouts.is_empty() {
        debug!(behavior, active, count = bouts.len(), "bouts extracted");
    }
    bouts
}

fn insert_bool(map: &mut crate::attributes::AttributeMap, name: &str, values: Vec<bool>) {
    map.insert(Attribute::new(
        name,
        "",
        AttributeClass::Derived,
        AttributeData::Bool(values),
    ));
}

fn build_view(flies: &FlyAttributes, i: usize) -> Result<FlyView, TrackingError> {
    let map = flies.fly(i);
    let centroid = map.require(names::BODY_CENTROID)?.as_vec2()?.to_vec();
    let n = centroid.len();
    let speed: Vec<f32> = (0..n)
        .map(|f| {
            let [vx, vy] = central_velocity(&centroid, f);
            (vx * vx + vy * vy).sqrt()
        })
        .collect();
    let moving_dir: Vec<f32> = (0..n)
        .map(|f| {
            let [vx, vy] = central_velocity(&centroid, f);
            vy.atan2(vx)
        })
        .collect();
    Ok(FlyView {
        orientation: map.require(names::BODY_ORIENTATION)?.as_float()?.to_vec(),
        semi_major: map.require(names::BODY_MAJOR_AXIS)?.as_float()?.to_vec(),
        semi_minor: map.require(names::BODY_MINOR_AXIS)?.as_float()?.to_vec(),
        left_wing_angle: map.require(names::LEFT_WING_ANGLE)?.as_float()?.to_vec(),
        right_wing_angle: map.require(names::RIGHT_WING_ANGLE)?.as_float()?.to_vec(),
        left_wing_area: map.require(names::LEFT_WING_AREA)?.as_float()?.to_vec(),
        right_wing_area: map.require(names::RIGHT_WING_AREA)?.as_float()?.to_vec(),
        centroid,
        speed,
        moving_dir,
    })
}

fn central_velocity(centroid: &[[f32; 2]], f: usize) -> [f32; 2] {
    let n = centroid.len();
    if n < 2 {
        return [0.0, 0.0];
    }
    let (a, b, span) = if f == 0 {
        (0, 1, 1.0)
    } else if f + 1 >= n {
        (n - 2, n - 1, 1.0)
    } else {
        (f - 1, f + 1, 2.0)
    };
    [
        (centroid[b][0] - centroid[a][0]) / span,
        (centroid[b][1] - centroid[a][1]) / span,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cal() -> Calibration {
        Calibration {
            pixel_per_millimeter: 10.0,
            source_frame_rate: 25.0,
            fly_count: 2,
        }
    }

    fn insert_float(map: &mut crate::attributes::AttributeMap, name: &str, v: Vec<f32>) {
        map.insert(Attribute::new(
            name,
            "",
            AttributeClass::Tracked,
            AttributeData::Float(v),
        ));
    }

    /// Minimal fly with everything the derivation reads.
    fn stub_fly(flies: &mut FlyAttributes, i: usize, n: usize, centroid: Vec<[f32; 2]>) {
        let map = flies.fly_mut(i);
        map.insert(Attribute::new(
            names::BODY_CENTROID,
            "px",
            AttributeClass::Tracked,
            AttributeData::Vec2(centroid),
        ));
        insert_float(map, names::BODY_ORIENTATION, vec![0.0; n]);
        insert_float(map, names::BODY_MAJOR_AXIS, vec![8.0; n]);
        insert_float(map, names::BODY_MINOR_AXIS, vec![4.0; n]);
        for name in [
            names::LEFT_WING_ANGLE,
            names::RIGHT_WING_ANGLE,
            names::LEFT_WING_AREA,
            names::RIGHT_WING_AREA,
        ] {
            insert_float(map, name, vec![0.0; n]);
        }
    }

    #[test]
    fn wing_extension_bout_survives_persistence_filter() {
        let n = 100;
        let fps = 25.0;
        let mut flies = FlyAttributes::new(2);
        for i in 0..2 {
            stub_fly(&mut flies, i, n, vec![[10.0 + 500.0 * i as f32, 10.0]; n]);
        }
        // Fly 0 extends its left wing for 1 second (25 frames) mid-video.
        {
            let map = flies.fly_mut(0);
            let mut angle = vec![0.0f32; n];
            let mut area = vec![0.0f32; n];
            for f in 40..65 {
                angle[f] = 60f32.to_radians();
                area[f] = 20.0; // px^2, above 0.05 mm^2 * 100 px^2/mm^2
            }
            insert_float(map, names::LEFT_WING_ANGLE, angle);
            insert_float(map, names::LEFT_WING_AREA, area);
        }
        let mut pairs = PairAttributes::new(2);
        let mut frames = FrameAttributes::new();

        let mut cfg = BehaviorConfig::default();
        cfg.wing_extension.persistence_seconds = 0.5;

        let bouts = derive_all(&mut flies, &mut pairs, &mut frames, &cal(), &cfg).unwrap();

        let wing_bouts: Vec<&BoutEvent> = bouts
            .iter()
            .filter(|b| b.behavior == names::WING_EXT_LEFT && b.active_fly == 0)
            .collect();
        assert_eq!(wing_bouts.len(), 1, "exactly one left-wing bout");
        assert!(
            wing_bouts[0].seconds >= 0.5,
            "bout of {}s must survive a 0.5s persistence window",
            wing_bouts[0].seconds
        );
        // The far-away passive fly shows nothing.
        assert!(bouts
            .iter()
            .all(|b| !(b.behavior == names::WING_EXT_LEFT && b.active_fly == 1)));
    }

    #[test]
    fn stationary_close_pair_copulates_and_courts() {
        let n = 600; // 24 s
        let mut flies = FlyAttributes::new(2);
        stub_fly(&mut flies, 0, n, vec![[100.0, 100.0]; n]);
        stub_fly(&mut flies, 1, n, vec![[108.0, 100.0]; n]); // 0.8 mm apart
        let mut pairs = PairAttributes::new(2);
        let mut frames = FrameAttributes::new();

        let bouts = derive_all(
            &mut flies,
            &mut pairs,
            &mut frames,
            &cal(),
            &BehaviorConfig::default(),
        )
        .unwrap();

        assert!(
            bouts.iter().any(|b| b.behavior == names::COPULATION),
            "close stationary pair should register copulation"
        );
        let courtship = frames
            .attrs
            .require(names::COURTSHIP)
            .unwrap()
            .as_bool()
            .unwrap();
        assert!(courtship.iter().any(|&v| v), "courtship OR must fire");
    }

    #[test]
    fn distant_pair_shows_no_pair_behavior() {
        let n = 200;
        let mut flies = FlyAttributes::new(2);
        stub_fly(&mut flies, 0, n, vec![[10.0, 10.0]; n]);
        stub_fly(&mut flies, 1, n, vec![[400.0, 400.0]; n]);
        let mut pairs = PairAttributes::new(2);
        let mut frames = FrameAttributes::new();

        let bouts = derive_all(
            &mut flies,
            &mut pairs,
            &mut frames,
            &cal(),
            &BehaviorConfig::default(),
        )
        .unwrap();
        assert!(bouts.is_empty(), "got: {bouts:?}");
    }
}

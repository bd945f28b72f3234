// src/tracking/heading.rs
//
// Left-vs-right facing. The body ellipse fixes orientation only up to a
// half-turn, so a second global decode runs per fly, independent of
// identity resolution: per-frame cues (motion direction, wing placement,
// body color asymmetry) anchor the facing, frame-to-frame orientation
// persistence ties neighbors together. Flipped frames get their
// orientation rotated by half a turn, and the physical wing quadrants are
// remapped onto the left/right series accordingly.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::arena::Calibration;
use super::hofacker::{self, ScoreChain};
use crate::attributes::{names, Attribute, AttributeClass, AttributeData, FlyAttributes};
use crate::error::TrackingError;
use crate::geometry::angle_difference;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingConfig {
    pub weight_motion: f32,
    pub weight_wing: f32,
    pub weight_color: f32,
    /// Weight on the orientation-persistence transition channel.
    pub weight_persistence: f32,
    /// Speed at which the motion cue reaches full strength.
    pub min_speed_mm_per_s: f32,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            weight_motion: 1.0,
            weight_wing: 1.0,
            weight_color: 0.5,
            weight_persistence: 2.0,
            min_speed_mm_per_s: 2.0,
        }
    }
}

/// Quadrant series that become the left/right wing series, for the two
/// facing hypotheses. A half-turn maps front-left onto rear-right.
const LEFT_SOURCES: (&str, &str) = (names::WING_ANGLE_REAR_LEFT, names::WING_ANGLE_FRONT_RIGHT);
const RIGHT_SOURCES: (&str, &str) = (names::WING_ANGLE_REAR_RIGHT, names::WING_ANGLE_FRONT_LEFT);
const LEFT_AREA_SOURCES: (&str, &str) = (names::WING_AREA_REAR_LEFT, names::WING_AREA_FRONT_RIGHT);
const RIGHT_AREA_SOURCES: (&str, &str) = (names::WING_AREA_REAR_RIGHT, names::WING_AREA_FRONT_LEFT);

pub fn resolve_heading(
    flies: &mut FlyAttributes,
    clean: &[bool],
    cal: &Calibration,
    cfg: &HeadingConfig,
) -> Result<(), TrackingError> {
    let full_speed = cal.mm_per_s_to_px_per_frame(cfg.min_speed_mm_per_s).max(1e-6);

    for fly in 0..flies.fly_count() {
        let map = flies.fly(fly);
        let centroid = map.require(names::BODY_CENTROID)?.as_vec2()?.to_vec();
        let orientation = map.require(names::BODY_ORIENTATION)?.as_float()?.to_vec();
        let wing_cue = map.require(names::HEADING_WING_CUE)?.as_float()?.to_vec();
        let color_cue = map.require(names::HEADING_COLOR_CUE)?.as_float()?.to_vec();
        let n = orientation.len();
        if n == 0 {
            continue;
        }

        // Per-frame anchors: motion + wing + color, only on clean frames.
        let mut anchors = vec![0.0f32; n];
        for f in 0..n {
            if !clean.get(f).copied().unwrap_or(false) {
                continue;
            }
            let (vx, vy) = central_velocity(&centroid, f);
            let speed = (vx * vx + vy * vy).sqrt();
            let motion = if speed > 1e-6 {
                let gate = (speed / full_speed).min(1.0);
                angle_difference(vy.atan2(vx), orientation[f]).cos() * gate
            } else {
                0.0
            };
            anchors[f] = cfg.weight_motion * motion
                + cfg.weight_wing * wing_cue[f]
                + cfg.weight_color * color_cue[f];
        }

        // Persistence transitions between consecutive frames.
        let transitions: Vec<f32> = (0..n.saturating_sub(1))
            .map(|f| {
                cfg.weight_persistence * angle_difference(orientation[f + 1], orientation[f]).cos()
            })
            .collect();

        let resolution = hofacker::resolve(&ScoreChain {
            anchors,
            transitions,
        });
        let mask = resolution.anchor_flips;
        let flips = mask.iter().filter(|&&m| m).count();
        debug!(fly, flips, evidence = resolution.evidence, "heading decoded");

        // Rotate flipped orientations by a half turn.
        let map = flies.fly_mut(fly);
        map.require_mut(names::BODY_ORIENTATION)?
            .rotate_masked(&mask, std::f32::consts::PI)?;
        map.insert(Attribute::new(
            names::HEADING_FLIPPED,
            "",
            AttributeClass::Derived,
            AttributeData::Bool(mask.clone()),
        ));

        // Select the physical quadrants that are anatomically left/right
        // under the decoded facing.
        for (target, (unflipped, flipped), unit) in [
            (names::LEFT_WING_ANGLE, LEFT_SOURCES, "rad"),
            (names::RIGHT_WING_ANGLE, RIGHT_SOURCES, "rad"),
            (names::LEFT_WING_AREA, LEFT_AREA_SOURCES, "px^2"),
            (names::RIGHT_WING_AREA, RIGHT_AREA_SOURCES, "px^2"),
        ] {
            let a = map.require(unflipped)?.as_float()?;
            let b = map.require(flipped)?.as_float()?;
            let values: Vec<f32> = (0..n).map(|f| if mask[f] { b[f] } else { a[f] }).collect();
            map.insert(Attribute::new(
                target,
                unit,
                AttributeClass::Derived,
                AttributeData::Float(values),
            ));
        }
    }
    info!(flies = flies.fly_count(), "heading resolution complete");
    Ok(())
}

fn central_velocity(centroid: &[[f32; 2]], f: usize) -> (f32, f32) {
    let n = centroid.len();
    if n < 2 {
        return (0.0, 0.0);
    }
    let (a, b, span) = if f == 0 {
        (0, 1, 1.0)
    } else if f + 1 >= n {
        (n - 2, n - 1, 1.0)
    } else {
        (f - 1, f + 1, 2.0)
    };
    (
        (centroid[b][0] - centroid[a][0]) / span,
        (centroid[b][1] - centroid[a][1]) / span,
    )
}

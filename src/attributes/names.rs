// src/attributes/names.rs
//
// Canonical attribute names. Tracked series are written once by
// normalize_tracking_data(); derived series are produced by later passes
// and may be cleared and recomputed.

// Per-frame.
pub const TRACKED_FLY_COUNT: &str = "trackedFlyCount";
pub const IS_OCCLUSION: &str = "isOcclusion";
pub const IS_MISSEGMENTED: &str = "isMissegmented";
pub const BODY_THRESHOLD: &str = "bodyThreshold";
pub const WING_THRESHOLD: &str = "wingThreshold";
pub const ID_PERMUTATION: &str = "idPermutation";
pub const S_SIZE: &str = "sSize";
pub const S_COMBINED: &str = "sCombined";
pub const T_POS: &str = "tPos";
pub const T_MOV: &str = "tMov";
pub const T_BOC: &str = "tBoc";
pub const T_COMBINED: &str = "tCombined";
pub const IDENTITY_PROBABILITY: &str = "identityProbability";
pub const COURTSHIP: &str = "courtship";

/// Frame channels negated by an identity relabel (scores and log-odds).
pub const SIGNED_CHANNELS: [&str; 6] = [S_SIZE, S_COMBINED, T_POS, T_MOV, T_BOC, T_COMBINED];
/// Frame channels complemented (p -> 1 - p) by an identity relabel.
pub const PROBABILITY_CHANNELS: [&str; 1] = [IDENTITY_PROBABILITY];

// Per-fly, tracked.
pub const BODY_CENTROID: &str = "bodyCentroid";
pub const BODY_AREA: &str = "bodyArea";
pub const BODY_MAJOR_AXIS: &str = "bodyMajorAxis";
pub const BODY_MINOR_AXIS: &str = "bodyMinorAxis";
pub const BODY_ORIENTATION: &str = "bodyOrientation";
pub const BODY_ECCENTRICITY: &str = "bodyEccentricity";
pub const BODY_SPLIT: &str = "bodySplit";
pub const MISSING: &str = "missing";
pub const WING_AREA: &str = "wingArea";
pub const WING_AREA_FRONT_LEFT: &str = "wingAreaFrontLeft";
pub const WING_AREA_FRONT_RIGHT: &str = "wingAreaFrontRight";
pub const WING_AREA_REAR_LEFT: &str = "wingAreaRearLeft";
pub const WING_AREA_REAR_RIGHT: &str = "wingAreaRearRight";
pub const WING_ANGLE_FRONT_LEFT: &str = "wingAngleFrontLeft";
pub const WING_ANGLE_FRONT_RIGHT: &str = "wingAngleFrontRight";
pub const WING_ANGLE_REAR_LEFT: &str = "wingAngleRearLeft";
pub const WING_ANGLE_REAR_RIGHT: &str = "wingAngleRearRight";
pub const WING_TIP_FRONT_LEFT: &str = "wingTipFrontLeft";
pub const WING_TIP_FRONT_RIGHT: &str = "wingTipFrontRight";
pub const WING_TIP_REAR_LEFT: &str = "wingTipRearLeft";
pub const WING_TIP_REAR_RIGHT: &str = "wingTipRearRight";
pub const HEADING_COLOR_CUE: &str = "headingColorCue";
pub const HEADING_SHAPE_CUE: &str = "headingShapeCue";
pub const HEADING_WING_CUE: &str = "headingWingCue";
pub const BODY_CONTOUR: &str = "bodyContour";
pub const WING_CONTOUR: &str = "wingContour";
pub const BODY_HISTOGRAM: &str = "bodyHistogram";

// Per-fly, derived.
pub const INTERPOLATED: &str = "interpolated";
pub const HEADING_FLIPPED: &str = "headingFlipped";
pub const VELOCITY: &str = "velocity";
pub const SPEED: &str = "speed";
pub const MOVING_DIRECTION: &str = "movingDirection";
pub const LEFT_WING_ANGLE: &str = "leftWingAngle";
pub const RIGHT_WING_ANGLE: &str = "rightWingAngle";
pub const LEFT_WING_AREA: &str = "leftWingArea";
pub const RIGHT_WING_AREA: &str = "rightWingArea";
pub const WING_EXT_LEFT: &str = "wingExtLeft";
pub const WING_EXT_RIGHT: &str = "wingExtRight";
pub const WING_EXT: &str = "wingExt";
pub const COURTING: &str = "courting";

// Per-pair, derived.
pub const DISTANCE_BODY_BODY: &str = "distanceBodyBody";
pub const ANGLE_TO_OTHER: &str = "angleToOther";
pub const CIRCLING: &str = "circling";
pub const FOLLOWING: &str = "following";
pub const ORIENTING: &str = "orienting";
pub const RAY_ELLIPSE_ORIENTING: &str = "rayEllipseOrienting";
pub const COPULATION: &str = "copulation";

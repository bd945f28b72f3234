// src/tracking/scores.rs
//
// Evidence scores for identity resolution. All scores live in [-1, 1] with
// positive meaning "the current labeling is right"; the probability and
// log-odds mappings put independent channels on an additive scale.

/// Bound on log-odds so a single saturated channel cannot drown the rest.
pub const LOGODD_CLAMP: f32 = 20.0;

/// Sign test over two paired series: fraction of decisive frames won by
/// `a` minus fraction won by `b`. Antisymmetric: sign_test(a, b) ==
/// -sign_test(b, a). Ties contribute nothing.
pub fn sign_test(a: &[f32], b: &[f32]) -> f32 {
    let mut wins_a = 0u32;
    let mut wins_b = 0u32;
    for (&x, &y) in a.iter().zip(b) {
        if x > y {
            wins_a += 1;
        } else if y > x {
            wins_b += 1;
        }
    }
    let total = wins_a + wins_b;
    if total == 0 {
        return 0.0;
    }
    (wins_a as f32 - wins_b as f32) / total as f32
}

/// Boundary evidence from two competing assignment costs:
/// (swapped - straight) / (swapped + straight). Positive when the straight
/// assignment is cheaper.
pub fn boundary_score(straight: f32, swapped: f32) -> f32 {
    let denom = straight + swapped;
    if denom <= f32::EPSILON {
        return 0.0;
    }
    (swapped - straight) / denom
}

/// Logistic mapping from a score in [-1, 1] to a probability that the
/// current labeling is correct.
pub fn score_to_prob(score: f32, steepness: f32) -> f32 {
    1.0 / (1.0 + (-steepness * score).exp())
}

/// Bounded log-odds; the clamp keeps later additive combination sane when
/// a probability saturates to 0 or 1.
pub fn prob2logodd(p: f32) -> f32 {
    let p = p.clamp(1e-12, 1.0 - 1e-12);
    (p / (1.0 - p)).ln().clamp(-LOGODD_CLAMP, LOGODD_CLAMP)
}

/// Score -> probability -> bounded log-odds in one step.
pub fn score_to_logodd(score: f32, steepness: f32) -> f32 {
    prob2logodd(score_to_prob(score, steepness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sign_test_is_antisymmetric() {
        let a = [10.0, 12.0, 9.0, 11.0, 10.5];
        let b = [5.0, 13.0, 4.0, 5.5, 5.0];
        assert_relative_eq!(sign_test(&a, &b), -sign_test(&b, &a));
        assert_relative_eq!(sign_test(&a, &b), 0.6);
    }

    #[test]
    fn sign_test_of_equal_series_is_zero() {
        let a = [1.0, 2.0, 3.0];
        assert_eq!(sign_test(&a, &a), 0.0);
        assert_eq!(sign_test(&[], &[]), 0.0);
    }

    #[test]
    fn boundary_score_sign_convention() {
        assert!(boundary_score(1.0, 9.0) > 0.0, "cheap straight => positive");
        assert!(boundary_score(9.0, 1.0) < 0.0);
        assert_eq!(boundary_score(0.0, 0.0), 0.0);
        assert_relative_eq!(boundary_score(1.0, 3.0), 0.5);
    }

    #[test]
    fn logodd_is_clamped_and_monotone() {
        assert_eq!(prob2logodd(1.0), LOGODD_CLAMP);
        assert_eq!(prob2logodd(0.0), -LOGODD_CLAMP);
        assert_relative_eq!(prob2logodd(0.5), 0.0);
        assert!(prob2logodd(0.9) > prob2logodd(0.6));
    }

    #[test]
    fn neutral_score_maps_to_even_odds() {
        assert_relative_eq!(score_to_prob(0.0, 4.0), 0.5);
        assert_relative_eq!(score_to_logodd(0.0, 4.0), 0.0);
        assert!(score_to_logodd(1.0, 4.0) > 0.0);
    }
}

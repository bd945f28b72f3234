// src/tracking/hofacker.rs
//
// Global decode of an alternating evidence chain.
//
// Input is an alternating sequence of anchor scores (one per unambiguous
// interval, positive = current labeling agrees with the global convention)
// and transition scores (one per ambiguous boundary, positive = labels on
// both sides connect without a swap). The decode picks one flip bit per
// anchor maximizing the total evidence whose sign agrees with the chosen
// pattern.
//
// Solved exactly with a two-state dynamic program over the chain; no
// brute-force enumeration. The same decode serves both identity
// resolution (anchors = sequences, transitions = occlusions) and heading
// disambiguation (anchors = frames, transitions = frame-to-frame
// persistence).
//
// The two-state formulation is the permutation group of a fly pair;
// arenas with more animals would need a larger state alphabet. That
// restriction is enforced upstream, where the chains are built.

/// Alternating score chain: `anchors.len() == transitions.len() + 1`
/// unless the chain is empty.
#[derive(Debug, Clone, Default)]
pub struct ScoreChain {
    pub anchors: Vec<f32>,
    pub transitions: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    /// Flip decision per anchor element.
    pub anchor_flips: Vec<bool>,
    /// Derived per transition: true when the adjacent anchors disagree.
    pub transition_flips: Vec<bool>,
    /// Sum of |score| over elements whose sign agrees with the decode.
    pub evidence: f32,
}

pub fn resolve(chain: &ScoreChain) -> Resolution {
    let n = chain.anchors.len();
    if n == 0 {
        return Resolution {
            anchor_flips: Vec::new(),
            transition_flips: Vec::new(),
            evidence: 0.0,
        };
    }
    debug_assert_eq!(chain.transitions.len() + 1, n, "chain must alternate");

    // dp[x] = best achievable signed total with the current anchor in
    // state x (0 = keep, 1 = flip). parent[i][x] remembers the argmax.
    let anchor_term = |i: usize, x: usize| chain.anchors[i] * if x == 0 { 1.0 } else { -1.0 };
    let transition_term = |i: usize, same: bool| {
        let t = chain.transitions[i];
        if same {
            t
        } else {
            -t
        }
    };

    let mut dp = [anchor_term(0, 0), anchor_term(0, 1)];
    let mut parent = vec![[0usize; 2]; n];
    for i in 1..n {
        let mut next = [f32::NEG_INFINITY; 2];
        for x in 0..2 {
            for prev in 0..2 {
                let candidate = dp[prev] + transition_term(i - 1, prev == x) + anchor_term(i, x);
                if candidate > next[x] {
                    next[x] = candidate;
                    parent[i][x] = prev;
                }
            }
        }
        dp = next;
    }

    let mut state = if dp[0] >= dp[1] { 0 } else { 1 };
    let signed_total = dp[state];
    let mut anchor_flips = vec![false; n];
    for i in (0..n).rev() {
        anchor_flips[i] = state == 1;
        state = parent[i][state];
    }

    let transition_flips: Vec<bool> = (0..chain.transitions.len())
        .map(|i| anchor_flips[i] != anchor_flips[i + 1])
        .collect();

    // signed_total = agreeing - disagreeing; evidence = agreeing.
    let magnitude: f32 = chain
        .anchors
        .iter()
        .chain(chain.transitions.iter())
        .map(|s| s.abs())
        .sum();
    let evidence = (signed_total + magnitude) / 2.0;

    Resolution {
        anchor_flips,
        transition_flips,
        evidence,
    }
}

// src/attributes/collections.rs
//
// The three attribute collections and the Relabel doorway. Identity flips
// rewrite whole collections under a per-frame mask; the revision counter
// records how many relabel passes have touched a collection.

use std::collections::BTreeMap;

use tracing::debug;

use super::attribute::Attribute;
use super::names;
use crate::error::TrackingError;

/// Identity-flip algorithms in this crate are pair-specific. The flip mask
/// is the permutation group of two elements; generalizing to N flies would
/// need a permutation series instead of a bit series.
pub const PAIR_FLY_COUNT: usize = 2;

/// Ordered name -> series map; iteration order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    attrs: BTreeMap<String, Attribute>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attr: Attribute) {
        self.attrs.insert(attr.name.clone(), attr);
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs.get_mut(name)
    }

    pub fn require(&self, name: &str) -> Result<&Attribute, TrackingError> {
        self.attrs.get(name).ok_or_else(|| TrackingError::AttributeType {
            name: name.to_string(),
            reason: "attribute not present".to_string(),
        })
    }

    pub fn require_mut(&mut self, name: &str) -> Result<&mut Attribute, TrackingError> {
        self.attrs
            .get_mut(name)
            .ok_or_else(|| TrackingError::AttributeType {
                name: name.to_string(),
                reason: "attribute not present".to_string(),
            })
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.attrs.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attrs.values()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn validate_lengths(&self, frame_count: usize) -> Result<(), TrackingError> {
        for attr in self.attrs.values() {
            if attr.len() != frame_count {
                return Err(TrackingError::LengthMismatch {
                    name: attr.name.clone(),
                    expected: frame_count,
                    actual: attr.len(),
                });
            }
        }
        Ok(())
    }
}

/// The single sanctioned doorway for identity flips. Implementations must
/// be self-inverse under the same mask and a no-op under an all-false mask.
pub trait Relabel {
    fn relabel(&mut self, mask: &[bool]) -> Result<(), TrackingError>;
}

// ─── per-frame ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FrameAttributes {
    pub attrs: AttributeMap,
    revision: u32,
}

impl FrameAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }
}

impl Relabel for FrameAttributes {
    /// Frame series carry no per-fly identity, but the evidence channels
    /// are signed relative to the current labeling: scores and log-odds
    /// negate, probabilities complement, the permutation bit toggles.
    fn relabel(&mut self, mask: &[bool]) -> Result<(), TrackingError> {
        for name in names::SIGNED_CHANNELS {
            if let Some(attr) = self.attrs.get_mut(name) {
                attr.negate_masked(mask)?;
            }
        }
        for name in names::PROBABILITY_CHANNELS {
            if let Some(attr) = self.attrs.get_mut(name) {
                attr.complement_masked(mask)?;
            }
        }
        if let Some(attr) = self.attrs.get_mut(names::ID_PERMUTATION) {
            attr.xor_masked(mask)?;
        }
        self.revision += 1;
        debug!(revision = self.revision, "frame attributes relabeled");
        Ok(())
    }
}

// ─── per-fly ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FlyAttributes {
    flies: Vec<AttributeMap>,
    revision: u32,
}

impl FlyAttributes {
    pub fn new(fly_count: usize) -> Self {
        Self {
            flies: (0..fly_count).map(|_| AttributeMap::new()).collect(),
            revision: 0,
        }
    }

    pub fn fly_count(&self) -> usize {
        self.flies.len()
    }

    pub fn fly(&self, index: usize) -> &AttributeMap {
        &self.flies[index]
    }

    pub fn fly_mut(&mut self, index: usize) -> &mut AttributeMap {
        &mut self.flies[index]
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn validate_lengths(&self, frame_count: usize) -> Result<(), TrackingError> {
        for fly in &self.flies {
            fly.validate_lengths(frame_count)?;
        }
        Ok(())
    }
}

impl Relabel for FlyAttributes {
    fn relabel(&mut self, mask: &[bool]) -> Result<(), TrackingError> {
        if self.flies.len() != PAIR_FLY_COUNT {
            return Err(TrackingError::UnsupportedFlyCount {
                actual: self.flies.len(),
            });
        }
        let name_list: Vec<String> = self.flies[0].names().map(str::to_string).collect();
        let (head, tail) = self.flies.split_at_mut(1);
        for name in &name_list {
            let a = head[0].require_mut(name)?;
            let b = tail[0].require_mut(name)?;
            Attribute::swap_masked(a, b, mask)?;
        }
        self.revision += 1;
        debug!(revision = self.revision, "fly attributes relabeled");
        Ok(())
    }
}

// ─── per-pair ───────────────────────────────────────────────────────────

/// Attribute maps keyed (active, passive), active != passive.
#[derive(Debug, Clone)]
pub struct PairAttributes {
    fly_count: usize,
    pairs: BTreeMap<(usize, usize), AttributeMap>,
    revision: u32,
}

impl PairAttributes {
    pub fn new(fly_count: usize) -> Self {
        let mut pairs = BTreeMap::new();
        for a in 0..fly_count {
            for p in 0..fly_count {
                if a != p {
                    pairs.insert((a, p), AttributeMap::new());
                }
            }
        }
        Self {
            fly_count,
            pairs,
            revision: 0,
        }
    }

    pub fn fly_count(&self) -> usize {
        self.fly_count
    }

    pub fn pair(&self, active: usize, passive: usize) -> &AttributeMap {
        &self.pairs[&(active, passive)]
    }

    pub fn pair_mut(&mut self, active: usize, passive: usize) -> &mut AttributeMap {
        self.pairs.get_mut(&(active, passive)).expect("valid pair key")
    }

    pub fn keys(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs.keys().copied()
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn validate_lengths(&self, frame_count: usize) -> Result<(), TrackingError> {
        for map in self.pairs.values() {
            map.validate_lengths(frame_count)?;
        }
        Ok(())
    }
}

impl Relabel for PairAttributes {
    /// Swapping fly 0 and 1 exchanges the roles in each pair: the (0,1)
    /// series trade places with the (1,0) series.
    fn relabel(&mut self, mask: &[bool]) -> Result<(), TrackingError> {
        if self.fly_count != PAIR_FLY_COUNT {
            return Err(TrackingError::UnsupportedFlyCount {
                actual: self.fly_count,
            });
        }
        let mut forward = self.pairs.remove(&(0, 1)).unwrap_or_default();
        let mut backward = self.pairs.remove(&(1, 0)).unwrap_or_default();

        let name_list: Vec<String> = forward.names().map(str::to_string).collect();
        let mut result: Result<(), TrackingError> = Ok(());
        for name in &name_list {
            let (Some(a), Some(b)) = (forward.get_mut(name), backward.get_mut(name)) else {
                result = Err(TrackingError::AttributeType {
                    name: name.clone(),
                    reason: "present in (0,1) but not (1,0)".to_string(),
                });
                break;
            };
            if let Err(e) = Attribute::swap_masked(a, b, mask) {
                result = Err(e);
                break;
            }
        }

        self.pairs.insert((0, 1), forward);
        self.pairs.insert((1, 0), backward);
        result?;
        self.revision += 1;
        debug!(revision = self.revision, "pair attributes relabeled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeClass, AttributeData};

    fn float_attr(name: &str, values: Vec<f32>) -> Attribute {
        Attribute::new(name, "px", AttributeClass::Tracked, AttributeData::Float(values))
    }

    #[test]
    fn fly_relabel_swaps_series_between_flies() {
        let mut flies = FlyAttributes::new(2);
        flies.fly_mut(0).insert(float_attr("bodyArea", vec![10.0, 10.0, 10.0]));
        flies.fly_mut(1).insert(float_attr("bodyArea", vec![5.0, 5.0, 5.0]));

        flies.relabel(&[false, true, false]).unwrap();
        assert_eq!(
            flies.fly(0).require("bodyArea").unwrap().as_float().unwrap(),
            &[10.0, 5.0, 10.0]
        );
        assert_eq!(flies.revision(), 1);
    }

    #[test]
    fn all_false_mask_is_identity() {
        let mut flies = FlyAttributes::new(2);
        flies.fly_mut(0).insert(float_attr("bodyArea", vec![1.0, 2.0]));
        flies.fly_mut(1).insert(float_attr("bodyArea", vec![3.0, 4.0]));
        let before = flies.clone();

        flies.relabel(&[false, false]).unwrap();
        assert_eq!(
            flies.fly(0).require("bodyArea").unwrap(),
            before.fly(0).require("bodyArea").unwrap()
        );
        assert_eq!(
            flies.fly(1).require("bodyArea").unwrap(),
            before.fly(1).require("bodyArea").unwrap()
        );
    }

    #[test]
    fn relabel_rejects_non_pair_arenas() {
        let mut flies = FlyAttributes::new(3);
        assert!(matches!(
            flies.relabel(&[false]),
            Err(TrackingError::UnsupportedFlyCount { actual: 3 })
        ));
    }

    #[test]
    fn pair_relabel_swaps_active_passive() {
        let mut pairs = PairAttributes::new(2);
        pairs.pair_mut(0, 1).insert(float_attr("distanceBodyBody", vec![1.0, 1.0]));
        pairs.pair_mut(1, 0).insert(float_attr("distanceBodyBody", vec![2.0, 2.0]));

        pairs.relabel(&[true, false]).unwrap();
        assert_eq!(
            pairs.pair(0, 1).require("distanceBodyBody").unwrap().as_float().unwrap(),
            &[2.0, 1.0]
        );
    }

    #[test]
    fn frame_relabel_flips_evidence_channels() {
        let mut frame = FrameAttributes::new();
        frame.attrs.insert(float_attr(names::T_POS, vec![0.5, -0.5]));
        frame.attrs.insert(Attribute::new(
            names::IDENTITY_PROBABILITY,
            "",
            AttributeClass::Derived,
            AttributeData::Float(vec![0.8, 0.8]),
        ));
        frame.attrs.insert(Attribute::new(
            names::ID_PERMUTATION,
            "",
            AttributeClass::Tracked,
            AttributeData::Bool(vec![false, false]),
        ));

        frame.relabel(&[true, true]).unwrap();
        assert_eq!(
            frame.attrs.require(names::T_POS).unwrap().as_float().unwrap(),
            &[-0.5, 0.5]
        );
        let p = frame
            .attrs
            .require(names::IDENTITY_PROBABILITY)
            .unwrap()
            .as_float()
            .unwrap();
        assert!((p[0] - 0.2).abs() < 1e-6);
        assert_eq!(
            frame.attrs.require(names::ID_PERMUTATION).unwrap().as_bool().unwrap(),
            &[true, true]
        );
    }

    #[test]
    fn length_validation_catches_ragged_series() {
        let mut flies = FlyAttributes::new(2);
        flies.fly_mut(0).insert(float_attr("bodyArea", vec![1.0, 2.0]));
        flies.fly_mut(1).insert(float_attr("bodyArea", vec![1.0]));
        assert!(flies.validate_lengths(2).is_err());
    }
}

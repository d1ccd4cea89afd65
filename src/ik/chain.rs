use super::target::{TargetPose, TargetProvider};
use crate::error::ConfigError;
use crate::math::geometry::{place_at_distance, DEGENERATE_LENGTH_SQUARED};
use crate::skeleton::{BoneGraph, BoneId};
use glam::Vec3;

/// A run of bones from `tip` up to and including `root`, pulled toward a
/// target.
#[derive(Debug, Clone)]
pub struct Chain {
    pub(crate) tip: BoneId,
    pub(crate) root: BoneId,
    pub(crate) weight: f32,
    pub(crate) target: Box<dyn TargetProvider>,
    pub(crate) bones: Vec<BoneId>,
}

impl Chain {
    pub fn builder(tip: BoneId, root: BoneId) -> ChainBuilder {
        ChainBuilder::new(tip, root)
    }

    pub fn tip(&self) -> BoneId {
        self.tip
    }

    pub fn root(&self) -> BoneId {
        self.root
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Resolved bones, tip first. Empty until the chain has been resolved.
    pub fn bones(&self) -> &[BoneId] {
        &self.bones
    }

    pub fn target(&self) -> &dyn TargetProvider {
        self.target.as_ref()
    }

    pub fn set_target<T: TargetProvider + 'static>(&mut self, target: T) {
        self.target = Box::new(target);
    }

    pub(crate) fn set_boxed_target(&mut self, target: Box<dyn TargetProvider>) {
        self.target = target;
    }

    /// Validates the chain against `graph` and caches its bone path.
    pub fn resolve(&mut self, graph: &BoneGraph) -> Result<(), ConfigError> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(ConfigError::InvalidParameter(format!(
                "chain weight must be positive, got {}",
                self.weight
            )));
        }
        self.bones = graph.path(self.tip, self.root)?;
        Ok(())
    }

    /// Sum of the effective lengths between tip and root.
    pub fn reach(&self, graph: &BoneGraph) -> f32 {
        self.bones
            .iter()
            .filter(|&&id| id != self.root)
            .map(|&id| graph[id].effective_length())
            .sum()
    }

    /// Squared distance from the tip to `target`.
    pub fn error(&self, graph: &BoneGraph, target: Vec3) -> f32 {
        graph.position(self.tip).distance_squared(target)
    }

    /// Pulls the chain toward `target`, from the tip up to the root.
    ///
    /// Each bone moves to the weighted average of every chain that wrote it
    /// this pass; the ancestor goal keeps the bone's length but leaves the
    /// ancestor itself in place.
    pub(crate) fn backward(&self, graph: &mut BoneGraph, target: &TargetPose) {
        if graph[self.tip].is_leaf() {
            if let Some(rotation) = target.rotation.filter(|r| r.length_squared() > DEGENERATE_LENGTH_SQUARED) {
                graph.set_rotation(self.tip, rotation.normalize());
                graph.pin_orientation(self.tip);
            }
        }

        let mut goal = target.position;
        for &id in &self.bones {
            let position = graph.accumulate(id, goal, self.weight);
            if id == self.root {
                break;
            }
            let Some(parent) = graph.parent(id) else {
                break;
            };
            let bone = &graph[id];
            goal = place_at_distance(
                position,
                graph.position(parent),
                bone.effective_length(),
                -bone.start_direction(),
            );
        }
    }
}

pub struct ChainBuilder {
    tip: BoneId,
    root: BoneId,
    weight: f32,
    target: Option<Box<dyn TargetProvider>>,
}

impl ChainBuilder {
    pub fn new(tip: BoneId, root: BoneId) -> Self {
        Self {
            tip,
            root,
            weight: 1.0,
            target: None,
        }
    }

    pub fn weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn target<T: TargetProvider + 'static>(mut self, target: T) -> Self {
        self.target = Some(Box::new(target));
        self
    }

    /// Builds the chain. Without a target the chain aims at the origin.
    pub fn build(self) -> Chain {
        Chain {
            tip: self.tip,
            root: self.root,
            weight: self.weight,
            target: self.target.unwrap_or_else(|| Box::new(Vec3::ZERO)),
            bones: Vec::new(),
        }
    }
}

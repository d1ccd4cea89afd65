use super::{check_distinct, rest_distance, satisfy};
use crate::error::ConfigError;
use crate::skeleton::{BoneGraph, BoneId};

/// Three spokes sharing one target bone at fixed distances.
///
/// Normal mode moves the target to each spoke distance in turn, so the last
/// spoke wins ties. Reverse mode moves every spoke independently toward the
/// target; the spokes need not agree with each other afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ForkBind {
    pub spokes: [BoneId; 3],
    pub target: BoneId,
    pub reverse: bool,
    lengths: [f32; 3],
}

impl ForkBind {
    pub fn new(spokes: [BoneId; 3], target: BoneId) -> Self {
        Self {
            spokes,
            target,
            reverse: false,
            lengths: [0.0; 3],
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn resolve(&mut self, graph: &BoneGraph) -> Result<(), ConfigError> {
        let [a, b, c] = self.spokes;
        check_distinct(graph, &[a, b, c, self.target])?;
        self.lengths = self.spokes.map(|spoke| rest_distance(graph, spoke, self.target));
        Ok(())
    }

    pub fn lengths(&self) -> [f32; 3] {
        self.lengths
    }

    pub fn members(&self) -> Vec<BoneId> {
        let mut members = self.spokes.to_vec();
        members.push(self.target);
        members
    }

    /// Bones this fork writes.
    pub fn moved(&self) -> Vec<BoneId> {
        if self.reverse {
            self.spokes.to_vec()
        } else {
            vec![self.target]
        }
    }

    pub fn solve(&self, graph: &mut BoneGraph) {
        for (&spoke, &distance) in self.spokes.iter().zip(&self.lengths) {
            if self.reverse {
                satisfy(graph, self.target, spoke, distance);
            } else {
                satisfy(graph, spoke, self.target, distance);
            }
        }
    }
}

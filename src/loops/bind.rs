use std::collections::HashMap;

use super::{check_distinct, rest_distance, satisfy};
use crate::error::ConfigError;
use crate::rig::Slot;
use crate::skeleton::{BoneGraph, BoneId};

/// Relative area below which a rest-pose triangle counts as degenerate.
const DEGENERATE_AREA_RATIO: f32 = 1.0e-4;

/// Three bones held at fixed pairwise distances, optionally tied back to the
/// rest of the tree through one correction bone per vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Bind {
    pub bones: [BoneId; 3],
    /// Corrections given at registration.
    pub corrections: [Option<BoneId>; 3],
    linked: [Option<BoneId>; 3],
    lengths: [f32; 3],
    correction_lengths: [f32; 3],
}

impl Bind {
    pub fn new(bones: [BoneId; 3]) -> Self {
        Self {
            bones,
            corrections: [None; 3],
            linked: [None; 3],
            lengths: [0.0; 3],
            correction_lengths: [0.0; 3],
        }
    }

    pub fn with_corrections(mut self, corrections: [Option<BoneId>; 3]) -> Self {
        self.corrections = corrections;
        self
    }

    /// Validates against `graph` and captures rest-pose edge lengths.
    pub fn resolve(&mut self, graph: &BoneGraph) -> Result<(), ConfigError> {
        check_distinct(graph, &self.bones)?;
        for correction in self.corrections.iter().flatten() {
            graph.check(*correction)?;
            if self.bones.contains(correction) {
                return Err(ConfigError::DuplicateBone(*correction));
            }
        }
        if is_degenerate(graph, self.bones) {
            let [a, b, c] = self.bones;
            return Err(ConfigError::DegenerateTriangle(a, b, c));
        }

        let [b1, b2, b3] = self.bones;
        self.lengths = [
            rest_distance(graph, b1, b2),
            rest_distance(graph, b2, b3),
            rest_distance(graph, b3, b1),
        ];
        self.relink(graph, self.corrections);
        Ok(())
    }

    fn relink(&mut self, graph: &BoneGraph, linked: [Option<BoneId>; 3]) {
        self.linked = linked;
        for (slot, correction) in linked.iter().enumerate() {
            self.correction_lengths[slot] =
                correction.map_or(0.0, |c| rest_distance(graph, c, self.bones[slot]));
        }
    }

    /// Edge lengths `b1-b2`, `b2-b3`, `b3-b1`.
    pub fn lengths(&self) -> [f32; 3] {
        self.lengths
    }

    /// Correction bone in effect for a vertex, explicit or linked.
    pub fn correction(&self, slot: usize) -> Option<BoneId> {
        self.linked.get(slot).copied().flatten()
    }

    /// Every bone whose position must be final before this bind solves.
    pub fn members(&self) -> Vec<BoneId> {
        self.bones.iter().chain(self.linked.iter().flatten()).copied().collect()
    }

    pub(crate) fn triangle(&self) -> Triangle {
        Triangle {
            bones: self.bones,
            lengths: self.lengths,
            corrections: std::array::from_fn(|slot| {
                self.linked[slot].map(|c| (c, self.correction_lengths[slot]))
            }),
        }
    }

    pub fn solve(&self, graph: &mut BoneGraph) {
        self.triangle().solve(graph);
    }
}

/// Fills missing correction bones from earlier binds sharing a vertex.
///
/// Walks active binds in registration order; a vertex without an explicit
/// correction takes the correction the first earlier bind used for that same
/// bone.
pub fn link_corrections(binds: &mut [Slot<Bind>], graph: &BoneGraph) {
    let mut first_correction: HashMap<BoneId, BoneId> = HashMap::new();
    for slot in binds.iter_mut().filter(|slot| slot.active) {
        let bind = &mut slot.item;
        let mut linked = bind.corrections;
        for (vertex, correction) in linked.iter_mut().enumerate() {
            if correction.is_some() {
                continue;
            }
            if let Some(&shared) = first_correction.get(&bind.bones[vertex]) {
                if !bind.bones.contains(&shared) {
                    log::debug!("bind vertex {} reuses correction bone {}", bind.bones[vertex], shared);
                    *correction = Some(shared);
                }
            }
        }
        bind.relink(graph, linked);
        for (vertex, correction) in linked.iter().enumerate() {
            if let Some(correction) = correction {
                first_correction.entry(bind.bones[vertex]).or_insert(*correction);
            }
        }
    }
}

pub(super) fn is_degenerate(graph: &BoneGraph, bones: [BoneId; 3]) -> bool {
    let [a, b, c] = bones.map(|id| graph[id].rest_position());
    let longest = (b - a).length().max((c - b).length()).max((a - c).length());
    let doubled_area = (b - a).cross(c - a).length();
    longest <= f32::EPSILON || doubled_area <= DEGENERATE_AREA_RATIO * longest * longest
}

/// One triangle of distance constraints, the unit both binds and cages solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Triangle {
    pub bones: [BoneId; 3],
    /// Edges `0-1`, `1-2`, `2-0`.
    pub lengths: [f32; 3],
    pub corrections: [Option<(BoneId, f32)>; 3],
}

impl Triangle {
    fn edge(&self, a: usize, b: usize) -> f32 {
        match (a.min(b), a.max(b)) {
            (0, 1) => self.lengths[0],
            (1, 2) => self.lengths[1],
            _ => self.lengths[2],
        }
    }

    /// Fixed sequence of point projections. This does not converge exactly;
    /// it leaves a small residual on each edge.
    pub fn solve(&self, graph: &mut BoneGraph) {
        let [b1, b2, b3] = self.bones;
        let [d12, d23, d31] = self.lengths;

        satisfy(graph, b1, b2, d12);
        satisfy(graph, b2, b3, d23);
        if let Some((c1, distance)) = self.corrections[0] {
            satisfy(graph, c1, b1, distance);
            satisfy(graph, b1, b2, d12);
        }

        satisfy(graph, b3, b1, d31);
        satisfy(graph, b3, b2, d23);

        for vertex in 0..3 {
            let Some((correction, distance)) = self.corrections[vertex] else {
                continue;
            };
            satisfy(graph, correction, self.bones[vertex], distance);
            for other in (0..3).filter(|&other| other != vertex) {
                satisfy(graph, self.bones[vertex], self.bones[other], self.edge(vertex, other));
            }
        }

        for _ in 0..2 {
            satisfy(graph, b1, b3, d31);
            satisfy(graph, b3, b2, d23);
            satisfy(graph, b2, b3, d23);
            satisfy(graph, b3, b1, d31);
            satisfy(graph, b1, b2, d12);
        }
    }
}

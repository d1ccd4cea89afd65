use super::bind::{is_degenerate, Triangle};
use super::{check_distinct, rest_distance};
use crate::error::ConfigError;
use crate::skeleton::{BoneGraph, BoneId};

/// Quad of two backbone bones and two target bones held at all six rest
/// distances, with optional correction bones for `backbone_2`, `target_1`
/// and `target_2`.
#[derive(Debug, Clone, PartialEq)]
pub struct CageBind {
    pub backbone: [BoneId; 2],
    pub targets: [BoneId; 2],
    pub corrections: [Option<BoneId>; 3],
    lengths: [f32; 6],
    correction_lengths: [f32; 3],
}

impl CageBind {
    /// Triangle passes over the vertices `[backbone_1, backbone_2, target_1,
    /// target_2]`, covering both diagonal splits and ending where it began.
    pub const TRIANGLE_PASSES: [[usize; 3]; 5] = [[0, 1, 2], [1, 2, 3], [0, 1, 3], [0, 2, 3], [0, 1, 2]];

    pub fn new(backbone: [BoneId; 2], targets: [BoneId; 2]) -> Self {
        Self {
            backbone,
            targets,
            corrections: [None; 3],
            lengths: [0.0; 6],
            correction_lengths: [0.0; 3],
        }
    }

    pub fn with_corrections(mut self, corrections: [Option<BoneId>; 3]) -> Self {
        self.corrections = corrections;
        self
    }

    pub fn vertices(&self) -> [BoneId; 4] {
        [self.backbone[0], self.backbone[1], self.targets[0], self.targets[1]]
    }

    pub fn members(&self) -> Vec<BoneId> {
        self.vertices()
            .into_iter()
            .chain(self.corrections.iter().flatten().copied())
            .collect()
    }

    pub fn resolve(&mut self, graph: &BoneGraph) -> Result<(), ConfigError> {
        let vertices = self.vertices();
        check_distinct(graph, &vertices)?;
        for correction in self.corrections.iter().flatten() {
            graph.check(*correction)?;
            if vertices.contains(correction) {
                return Err(ConfigError::DuplicateBone(*correction));
            }
        }
        for pass in Self::TRIANGLE_PASSES {
            let triangle = pass.map(|v| vertices[v]);
            if is_degenerate(graph, triangle) {
                let [a, b, c] = triangle;
                return Err(ConfigError::DegenerateTriangle(a, b, c));
            }
        }

        for (i, j) in EDGES {
            self.lengths[edge_index(i, j)] = rest_distance(graph, vertices[i], vertices[j]);
        }
        for (slot, correction) in self.corrections.iter().enumerate() {
            self.correction_lengths[slot] =
                correction.map_or(0.0, |c| rest_distance(graph, c, vertices[slot + 1]));
        }
        Ok(())
    }

    /// Rest distance between two cage vertices.
    pub fn edge(&self, a: usize, b: usize) -> f32 {
        self.lengths[edge_index(a, b)]
    }

    fn correction_for(&self, vertex: usize) -> Option<(BoneId, f32)> {
        let slot = vertex.checked_sub(1)?;
        self.corrections[slot].map(|c| (c, self.correction_lengths[slot]))
    }

    pub(crate) fn triangle(&self, pass: [usize; 3]) -> Triangle {
        let vertices = self.vertices();
        let [a, b, c] = pass;
        Triangle {
            bones: pass.map(|v| vertices[v]),
            lengths: [self.edge(a, b), self.edge(b, c), self.edge(c, a)],
            corrections: pass.map(|v| self.correction_for(v)),
        }
    }

    pub fn solve(&self, graph: &mut BoneGraph) {
        for pass in Self::TRIANGLE_PASSES {
            self.triangle(pass).solve(graph);
        }
    }
}

const EDGES: [(usize, usize); 6] = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];

fn edge_index(a: usize, b: usize) -> usize {
    match (a.min(b), a.max(b)) {
        (0, 1) => 0,
        (0, 2) => 1,
        (0, 3) => 2,
        (1, 2) => 3,
        (1, 3) => 4,
        _ => 5,
    }
}

use glam::{Quat, Vec3};
use std::collections::HashMap;

use super::chain::Chain;
use super::target::TargetPose;
use crate::dynamics::{damped, solid};
use crate::error::ConfigError;
use crate::loops::LoopConstraints;
use crate::math::geometry::{blend_rotations, direction_or, place_at_distance, shortest_arc};
use crate::skeleton::{BoneGraph, BoneId, Modifier};

/// Iteration control for the chain solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Upper bound on backward/forward iterations per tick.
    pub max_iterations: u32,
    /// Per-chain tip distance considered converged.
    pub minimal_distance: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            minimal_distance: 0.01,
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_minimal_distance(mut self, minimal_distance: f32) -> Self {
        self.minimal_distance = minimal_distance;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.minimal_distance.is_finite() || self.minimal_distance < 0.0 {
            return Err(ConfigError::InvalidParameter(format!(
                "minimal distance must be finite and non-negative, got {}",
                self.minimal_distance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveResult {
    pub iterations: u32,
    /// Sum of squared tip-to-target distances after the chain solve.
    pub total_error: f32,
    pub converged: bool,
    /// The rig was disabled and nothing was solved.
    pub skipped: bool,
}

impl SolveResult {
    pub fn skipped() -> Self {
        Self {
            iterations: 0,
            total_error: 0.0,
            converged: false,
            skipped: true,
        }
    }
}

/// Everything a forward pass reads besides the graph.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    /// Root positions; roots without an entry stay at rest.
    pub anchors: &'a HashMap<BoneId, Vec3>,
    pub loops: &'a LoopConstraints,
    /// Step DampedTransform springs. Off for pure stabilization.
    pub integrate: bool,
}

impl PassContext<'_> {
    fn anchor(&self, graph: &BoneGraph, root: BoneId) -> Vec3 {
        self.anchors
            .get(&root)
            .copied()
            .unwrap_or_else(|| graph[root].rest_position())
    }
}

pub struct FabrikSolver;

impl FabrikSolver {
    /// Runs backward passes over every chain, each followed by one forward
    /// pass, until the summed tip error drops under the threshold or the
    /// iteration cap is hit.
    pub fn solve(
        graph: &mut BoneGraph,
        chains: &[(&Chain, TargetPose)],
        pass: &PassContext<'_>,
        config: &SolverConfig,
    ) -> SolveResult {
        let threshold = config.minimal_distance * config.minimal_distance * chains.len() as f32;
        let mut total_error = Self::total_error(graph, chains);
        let mut iterations = 0;

        while iterations < config.max_iterations && total_error > threshold {
            for (chain, target) in chains {
                chain.backward(graph, target);
            }
            Self::total_pass(graph, pass);
            iterations += 1;
            total_error = Self::total_error(graph, chains);
        }

        SolveResult {
            iterations,
            total_error,
            converged: total_error <= threshold,
            skipped: false,
        }
    }

    pub fn total_error(graph: &BoneGraph, chains: &[(&Chain, TargetPose)]) -> f32 {
        chains
            .iter()
            .map(|(chain, target)| chain.error(graph, target.position))
            .sum()
    }

    /// Forward stabilization pass.
    ///
    /// Walks the hierarchy breadth first from the anchored roots, restoring
    /// bone lengths and running loop constraints, rigid subtrees and springs
    /// where flagged. Orientations are derived from the final positions, then
    /// the backward-pass weights are cleared.
    pub fn total_pass(graph: &mut BoneGraph, pass: &PassContext<'_>) {
        let mut visited = vec![false; graph.len()];

        for order in 0..graph.len() {
            let id = graph.breadth_first()[order];
            match graph.parent(id) {
                Some(parent) => place(graph, id, parent, pass.integrate),
                None => {
                    let anchor = pass.anchor(graph, id);
                    graph.set_position(id, anchor);
                }
            }
            visited[id.index()] = true;

            if let Modifier::Loop(anchor) = graph[id].modifier() {
                let anchor = anchor.clone();
                let moved = pass.loops.solve_at(graph, &anchor);
                restabilize(graph, &moved, &visited);
            }
        }

        for order in 0..graph.len() {
            let id = graph.breadth_first()[order];
            update_orientation(graph, id);
        }
        graph.wipe_weights();
    }
}

/// Positions `id` relative to its already placed parent.
fn place(graph: &mut BoneGraph, id: BoneId, parent: BoneId, integrate: bool) {
    match *graph[id].modifier() {
        Modifier::Solid { master } if master != id => {
            let frame = graph.segment_swing(master);
            solid::place_rigid(graph, id, parent, frame);
        }
        Modifier::LookAt { master } => match graph.parent(master) {
            Some(pivot) => {
                let frame = graph.rotation_delta(pivot);
                solid::place_rigid(graph, id, parent, frame);
            }
            None => correct_length(graph, id, parent),
        },
        Modifier::Damped { master, .. } if master != id && integrate => {
            damped::integrate(graph, id, parent, master);
        }
        _ => correct_length(graph, id, parent),
    }
}

/// Moves the bone back to its length along the current parent-to-bone line.
fn correct_length(graph: &mut BoneGraph, id: BoneId, parent: BoneId) {
    let bone = &graph[id];
    let position = place_at_distance(
        graph.position(parent),
        bone.position(),
        bone.effective_length(),
        bone.start_direction(),
    );
    graph.set_position(id, position);
}

/// Re-places the visited descendants of bones a loop constraint moved.
fn restabilize(graph: &mut BoneGraph, moved: &[BoneId], visited: &[bool]) {
    for &bone in moved {
        for id in graph.subtree(bone).into_iter().skip(1) {
            if !visited[id.index()] || moved.contains(&id) {
                continue;
            }
            if let Some(parent) = graph.parent(id) {
                place(graph, id, parent, false);
            }
        }
    }
}

/// Derives the orientation of `id` from where its children ended up.
fn update_orientation(graph: &mut BoneGraph, id: BoneId) {
    let bone = &graph[id];
    if bone.look_at_pivot || bone.orientation_pinned {
        return;
    }

    let rotation = match *bone.modifier() {
        Modifier::Solid { master } => Some(graph.segment_swing(master) * bone.start_rotation()),
        Modifier::LookAt { master } => graph
            .parent(master)
            .map(|pivot| graph.rotation_delta(pivot) * bone.start_rotation()),
        Modifier::Damped { master, .. } if master == id && bone.is_root() => Some(bone.start_rotation()),
        _ => None,
    };
    let rotation = rotation.unwrap_or_else(|| {
        if bone.is_leaf() {
            match bone.parent() {
                Some(_) => graph.segment_swing(id) * bone.start_rotation(),
                None => bone.rotation(),
            }
        } else {
            let swings = bone.children().iter().map(|&child| {
                let child = &graph[child];
                let swing = shortest_arc(child.start_direction(), child.position() - bone.position());
                let weight = if child.weight_sum() > 0.0 { child.weight_sum() } else { 1.0 };
                (swing, weight)
            });
            blend_rotations(swings) * bone.start_rotation()
        }
    });

    let rotation = match bone.pole_twist {
        Some((toward, angle)) => {
            let axis = direction_or(graph.position(toward) - bone.position(), Vec3::Y);
            Quat::from_axis_angle(axis, angle) * rotation
        }
        None => rotation,
    };
    graph.set_rotation(id, rotation.normalize());
}

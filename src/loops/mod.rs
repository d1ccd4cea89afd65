//! Loop constraints: distance constraints that close cycles the bone tree
//! cannot express.
//!
//! Each constraint is attached to one anchor bone, the member the forward
//! pass reaches last, and is solved when the pass reaches that bone.

pub mod bind;
pub mod cage;
pub mod fork;

pub use bind::{link_corrections, Bind};
pub use cage::CageBind;
pub use fork::ForkBind;

use crate::error::ConfigError;
use crate::math::geometry::place_at_distance;
use crate::rig::Slot;
use crate::skeleton::{BoneGraph, BoneId, LoopAnchor};

/// Every registered loop constraint, indexed the way [`LoopAnchor`] refers to them.
#[derive(Debug, Clone, Default)]
pub struct LoopConstraints {
    pub binds: Vec<Slot<Bind>>,
    pub forks: Vec<Slot<ForkBind>>,
    pub cages: Vec<Slot<CageBind>>,
}

impl LoopConstraints {
    pub fn is_empty(&self) -> bool {
        self.binds.is_empty() && self.forks.is_empty() && self.cages.is_empty()
    }

    pub fn clear(&mut self) {
        self.binds.clear();
        self.forks.clear();
        self.cages.clear();
    }

    /// Solves the constraints anchored at one bone and returns the bones that
    /// may have moved.
    ///
    /// Reverse forks seed a placement first, cages and binds refine it, and
    /// regular forks correct last so the triangle passes cannot undo them.
    pub fn solve_at(&self, graph: &mut BoneGraph, anchor: &LoopAnchor) -> Vec<BoneId> {
        let mut moved = Vec::new();

        for fork in active(&self.forks, &anchor.forks).filter(|f| f.reverse) {
            fork.solve(graph);
            moved.extend(fork.moved());
        }
        for cage in active(&self.cages, &anchor.cages) {
            cage.solve(graph);
            moved.extend(cage.vertices());
        }
        for bind in active(&self.binds, &anchor.binds) {
            bind.solve(graph);
            moved.extend(bind.bones);
        }
        for fork in active(&self.forks, &anchor.forks).filter(|f| !f.reverse) {
            fork.solve(graph);
            moved.extend(fork.moved());
        }

        moved.sort_unstable();
        moved.dedup();
        moved
    }
}

fn active<'a, T>(slots: &'a [Slot<T>], indices: &'a [usize]) -> impl Iterator<Item = &'a T> + 'a {
    indices
        .iter()
        .filter_map(move |&i| slots.get(i))
        .filter(|slot| slot.active)
        .map(|slot| &slot.item)
}

/// The member the forward pass visits last.
pub(crate) fn anchor_of(graph: &BoneGraph, members: &[BoneId]) -> Option<BoneId> {
    members.iter().copied().max_by_key(|&id| graph.rank(id))
}

/// Moves `moving` onto the sphere of radius `distance` around `fixed`.
/// Roots stay pinned to their anchors.
pub(crate) fn satisfy(graph: &mut BoneGraph, fixed: BoneId, moving: BoneId, distance: f32) {
    let bone = &graph[moving];
    if bone.is_root() {
        return;
    }
    let position = place_at_distance(
        graph.position(fixed),
        bone.position(),
        distance,
        bone.start_direction(),
    );
    graph.set_position(moving, position);
}

/// Rejects repeated bones in one constraint.
pub(crate) fn check_distinct(graph: &BoneGraph, bones: &[BoneId]) -> Result<(), ConfigError> {
    for (i, &bone) in bones.iter().enumerate() {
        graph.check(bone)?;
        if bones[..i].contains(&bone) {
            return Err(ConfigError::DuplicateBone(bone));
        }
    }
    Ok(())
}

pub(crate) fn rest_distance(graph: &BoneGraph, a: BoneId, b: BoneId) -> f32 {
    graph[a].rest_position().distance(graph[b].rest_position())
}

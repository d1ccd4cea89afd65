use glam::Quat;

use crate::error::ConfigError;
use crate::skeleton::{BoneGraph, BoneId};

/// Keeps every descendant of `root` at its rest offset, carried rigidly by
/// the swing of the root's own segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solidifier {
    pub root: BoneId,
}

impl Solidifier {
    pub fn new(root: BoneId) -> Self {
        Self { root }
    }

    pub fn validate(&self, graph: &BoneGraph) -> Result<(), ConfigError> {
        graph.check(self.root)?;
        if graph.children(self.root).is_empty() {
            return Err(ConfigError::SolidifierWithoutChildren(self.root));
        }
        Ok(())
    }
}

/// Places `id` at its rest offset from `parent`, rotated by the subtree frame.
pub(crate) fn place_rigid(graph: &mut BoneGraph, id: BoneId, parent: BoneId, frame: Quat) {
    let bone = &graph[id];
    let position = graph.position(parent) + frame * bone.start_direction() * bone.effective_length();
    graph.set_position(id, position);
}

use glam::{Quat, Vec3};

use super::side::Side;
use super::target::TargetProvider;
use crate::error::ConfigError;
use crate::math::geometry::{reject, rotate_about, shortest_arc, signed_angle};
use crate::skeleton::{BoneGraph, BoneId};

/// Bends the interior joints of a chain toward a pole target.
#[derive(Debug, Clone)]
pub struct Pole {
    pub(crate) tip: BoneId,
    pub(crate) root: BoneId,
    pub(crate) side: Side,
    pub(crate) target: Box<dyn TargetProvider>,
    bones: Vec<BoneId>,
}

impl Pole {
    pub fn new<T: TargetProvider + 'static>(tip: BoneId, root: BoneId, side: Side, target: T) -> Self {
        Self {
            tip,
            root,
            side,
            target: Box::new(target),
            bones: Vec::new(),
        }
    }

    pub fn tip(&self) -> BoneId {
        self.tip
    }

    pub fn root(&self) -> BoneId {
        self.root
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub(crate) fn set_boxed_target(&mut self, target: Box<dyn TargetProvider>) {
        self.target = target;
    }

    pub fn resolve(&mut self, graph: &BoneGraph) -> Result<(), ConfigError> {
        if !self.side.is_lateral() {
            return Err(ConfigError::InvalidPoleSide(self.side));
        }
        let bones = graph.path(self.tip, self.root)?;
        if bones.len() < 3 {
            return Err(ConfigError::PoleChainTooShort {
                tip: self.tip,
                root: self.root,
                len: bones.len(),
            });
        }
        self.bones = bones;
        Ok(())
    }

    /// Swings every interior joint about its neighbours' axis toward `pole`,
    /// then twists it so the configured side faces the pole.
    pub(crate) fn solve(&self, graph: &mut BoneGraph, pole: Vec3) {
        for window in self.bones.windows(3) {
            let [child, joint, parent] = [window[0], window[1], window[2]];
            let anchor = graph.position(parent);
            let Some(axis) = (graph.position(child) - anchor).try_normalize() else {
                continue;
            };

            let position = graph.position(joint);
            let angle = signed_angle(reject(position - anchor, axis), reject(pole - anchor, axis), axis);
            if angle.is_finite() {
                graph.set_position(joint, rotate_about(position, anchor, axis, angle));
            }

            self.twist(graph, joint, child, pole);
        }
    }

    fn twist(&self, graph: &mut BoneGraph, joint: BoneId, child: BoneId, pole: Vec3) {
        let bone = &graph[joint];
        let next = &graph[child];
        let Some(child_direction) = (next.position() - bone.position()).try_normalize() else {
            return;
        };

        let base = shortest_arc(next.start_direction(), child_direction) * bone.start_rotation();
        let facing = reject(base * self.side.axis(), child_direction);
        let wanted = reject(pole - bone.position(), child_direction);
        if facing.length_squared() <= f32::EPSILON || wanted.length_squared() <= f32::EPSILON {
            return;
        }

        let angle = signed_angle(facing, wanted, child_direction);
        graph.set_pole_twist(joint, child, angle);
        graph.set_rotation(joint, (Quat::from_axis_angle(child_direction, angle) * base).normalize());
    }
}

use glam::{Quat, Vec3};

use super::side::Side;
use super::target::TargetProvider;
use crate::error::ConfigError;
use crate::math::geometry::{reject, shortest_arc, signed_angle};
use crate::skeleton::{BoneGraph, BoneId};

/// Turns a bone's parent so one axis of the bone faces a target.
#[derive(Debug, Clone)]
pub struct LookAt {
    pub(crate) bone: BoneId,
    pub(crate) side: Side,
    /// Roll about the facing direction, in radians. Used by `Up` and `Down`.
    pub(crate) spin: f32,
    pub(crate) target: Box<dyn TargetProvider>,
}

impl LookAt {
    pub fn new<T: TargetProvider + 'static>(bone: BoneId, side: Side, target: T) -> Self {
        Self {
            bone,
            side,
            spin: 0.0,
            target: Box::new(target),
        }
    }

    pub fn with_spin(mut self, spin: f32) -> Self {
        self.spin = spin;
        self
    }

    pub fn bone(&self) -> BoneId {
        self.bone
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub(crate) fn set_boxed_target(&mut self, target: Box<dyn TargetProvider>) {
        self.target = target;
    }

    pub fn resolve(&self, graph: &BoneGraph) -> Result<(), ConfigError> {
        graph.check(self.bone)?;
        if graph.parent(self.bone).is_none() {
            return Err(ConfigError::LookAtWithoutParent(self.bone));
        }
        if !self.spin.is_finite() {
            return Err(ConfigError::InvalidParameter(format!("look-at spin {} is not finite", self.spin)));
        }
        Ok(())
    }

    /// Rotation applied to the pivot so the bone faces `target`.
    pub fn facing(&self, graph: &BoneGraph, target: Vec3) -> Option<Quat> {
        let bone = &graph[self.bone];
        let pivot = graph.position(bone.parent()?);
        let rest = bone.start_direction();
        let offset = target - pivot;
        let direction = offset.try_normalize()?;

        let rotation = match self.side {
            Side::Up => Quat::from_axis_angle(direction, self.spin) * shortest_arc(rest, direction),
            Side::Down => Quat::from_axis_angle(-direction, self.spin) * shortest_arc(rest, -direction),
            _ => {
                // The side axis faces the target from the bone's midpoint, which
                // tilts the bone away from the target direction.
                let half = bone.effective_length() * 0.5;
                let tilt = (half / offset.length()).clamp(-1.0, 1.0).acos();
                let hinge = rest
                    .cross(direction)
                    .try_normalize()
                    .unwrap_or_else(|| direction.any_orthonormal_vector());
                let aim = Quat::from_axis_angle(hinge, -tilt) * direction;
                let swing = shortest_arc(rest, aim);
                let side = reject(swing * bone.start_rotation() * self.side.axis(), aim);
                let spin = signed_angle(side, reject(direction, aim), aim);
                Quat::from_axis_angle(aim, spin) * swing
            }
        };
        Some(rotation.normalize())
    }

    /// Rotates the pivot and carries the bone's subtree with it rigidly.
    pub(crate) fn solve(&self, graph: &mut BoneGraph, target: Vec3) {
        let Some(pivot) = graph.parent(self.bone) else {
            return;
        };
        let Some(rotation) = self.facing(graph, target) else {
            return;
        };

        graph.set_rotation(pivot, rotation * graph[pivot].start_rotation());
        for id in graph.subtree(self.bone) {
            let Some(parent) = graph.parent(id) else {
                continue;
            };
            let bone = &graph[id];
            let position = graph.position(parent) + rotation * bone.start_direction() * bone.effective_length();
            let orientation = rotation * bone.start_rotation();
            graph.set_position(id, position);
            graph.set_rotation(id, orientation.normalize());
        }
    }
}

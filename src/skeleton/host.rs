use glam::{Quat, Vec3};

use crate::math::Transform;

/// One host bone: name, parent index and rest transform in parent space.
#[derive(Debug, Clone, PartialEq)]
pub struct RestBone {
    pub name: String,
    pub parent: Option<usize>,
    pub rest: Transform,
}

impl RestBone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, rest: Transform) -> Self {
        Self {
            name: name.into(),
            parent,
            rest,
        }
    }
}

/// The skeleton a rig reads its rest pose from and writes solved poses to.
pub trait HostSkeleton {
    fn bone_count(&self) -> usize;
    fn bone_name(&self, index: usize) -> &str;
    fn bone_parent(&self, index: usize) -> Option<usize>;
    fn bone_rest(&self, index: usize) -> Transform;
    fn apply_local_pose(&mut self, index: usize, pose: Transform);

    fn rest_bones(&self) -> Vec<RestBone> {
        (0..self.bone_count())
            .map(|i| RestBone::new(self.bone_name(i), self.bone_parent(i), self.bone_rest(i)))
            .collect()
    }
}

/// In-memory skeleton for headless hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<RestBone>,
    pose: Vec<Transform>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bone(&mut self, name: impl Into<String>, parent: Option<usize>, rest: Transform) -> usize {
        self.bones.push(RestBone::new(name, parent, rest));
        self.pose.push(rest);
        self.bones.len() - 1
    }

    /// Adds a bone offset from its parent by `offset`, with identity rest rotation.
    pub fn add_offset(&mut self, name: impl Into<String>, parent: Option<usize>, offset: Vec3) -> usize {
        self.add_bone(name, parent, Transform::from_position_rotation(offset, Quat::IDENTITY))
    }

    pub fn bones(&self) -> &[RestBone] {
        &self.bones
    }

    /// Last local pose applied to the bone, or its rest pose.
    pub fn pose(&self, index: usize) -> Option<Transform> {
        self.pose.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

impl HostSkeleton for Skeleton {
    fn bone_count(&self) -> usize {
        self.bones.len()
    }

    fn bone_name(&self, index: usize) -> &str {
        &self.bones[index].name
    }

    fn bone_parent(&self, index: usize) -> Option<usize> {
        self.bones[index].parent
    }

    fn bone_rest(&self, index: usize) -> Transform {
        self.bones[index].rest
    }

    fn apply_local_pose(&mut self, index: usize, pose: Transform) {
        if let Some(slot) = self.pose.get_mut(index) {
            *slot = pose;
        }
    }

    fn rest_bones(&self) -> Vec<RestBone> {
        self.bones.clone()
    }
}

use glam::{Quat, Vec3};
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};

use crate::math::Transform;

/// A target sampled for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetPose {
    pub position: Vec3,
    /// Orientation handed to a leaf chain tip, if any.
    pub rotation: Option<Quat>,
}

impl TargetPose {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            rotation: None,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.map_or(true, |r| r.is_finite())
    }
}

/// Source of a Chain, Pole or LookAt target.
pub trait TargetProvider: Send + Sync + Debug {
    fn sample(&self) -> TargetPose;
    fn clone_box(&self) -> Box<dyn TargetProvider>;
}

impl Clone for Box<dyn TargetProvider> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl TargetProvider for Vec3 {
    fn sample(&self) -> TargetPose {
        TargetPose::new(*self)
    }

    fn clone_box(&self) -> Box<dyn TargetProvider> {
        Box::new(*self)
    }
}

impl TargetProvider for TargetPose {
    fn sample(&self) -> TargetPose {
        *self
    }

    fn clone_box(&self) -> Box<dyn TargetProvider> {
        Box::new(*self)
    }
}

impl TargetProvider for Transform {
    fn sample(&self) -> TargetPose {
        TargetPose::new(self.position).with_rotation(self.rotation)
    }

    fn clone_box(&self) -> Box<dyn TargetProvider> {
        Box::new(*self)
    }
}

/// Target the host keeps moving after handing a clone to the rig.
#[derive(Debug, Clone, Default)]
pub struct SharedTarget(Arc<RwLock<Transform>>);

impl SharedTarget {
    pub fn new(transform: Transform) -> Self {
        Self(Arc::new(RwLock::new(transform)))
    }

    pub fn set(&self, transform: Transform) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = transform;
    }

    pub fn set_position(&self, position: Vec3) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).position = position;
    }

    pub fn get(&self) -> Transform {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TargetProvider for SharedTarget {
    fn sample(&self) -> TargetPose {
        self.get().sample()
    }

    fn clone_box(&self) -> Box<dyn TargetProvider> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_carry_no_rotation() {
        let pose = Vec3::new(1.0, 2.0, 3.0).sample();
        assert_eq!(pose.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(pose.rotation, None);
    }

    #[test]
    fn shared_target_updates_every_clone() {
        let shared = SharedTarget::new(Transform::from_position(Vec3::X));
        let boxed: Box<dyn TargetProvider> = Box::new(shared.clone());
        let copy = boxed.clone();

        shared.set_position(Vec3::new(0.0, 4.0, 0.0));
        assert_eq!(copy.sample().position, Vec3::new(0.0, 4.0, 0.0));
        assert_eq!(copy.sample().rotation, Some(Quat::IDENTITY));
    }

    #[test]
    fn non_finite_poses_are_detected() {
        assert!(!TargetPose::new(Vec3::new(f32::NAN, 0.0, 0.0)).is_finite());
        assert!(!TargetPose::new(Vec3::ZERO)
            .with_rotation(Quat::from_xyzw(f32::INFINITY, 0.0, 0.0, 1.0))
            .is_finite());
    }
}

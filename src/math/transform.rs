use glam::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (point * self.scale) + self.position
    }

    /// Inverse of [`Transform::transform_point`]. Zero scale axes map to zero.
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        let local = self.rotation.inverse() * (point - self.position);
        let inv_scale = Vec3::select(self.scale.cmpeq(Vec3::ZERO), Vec3::ZERO, self.scale.recip());
        local * inv_scale
    }

    /// Composes a parent-space transform onto this one (`self * local`).
    pub fn mul_transform(&self, local: &Self) -> Self {
        Self {
            position: self.transform_point(local.position),
            rotation: (self.rotation * local.rotation).normalize(),
            scale: self.scale * local.scale,
        }
    }

    /// Expresses this transform in the space of `parent`.
    pub fn relative_to(&self, parent: &Self) -> Self {
        let inv_scale = Vec3::select(
            parent.scale.cmpeq(Vec3::ZERO),
            Vec3::ZERO,
            parent.scale.recip(),
        );
        Self {
            position: parent.inverse_transform_point(self.position),
            rotation: (parent.rotation.inverse() * self.rotation).normalize(),
            scale: self.scale * inv_scale,
        }
    }
}

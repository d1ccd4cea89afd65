//! Point projection and rotation helpers shared by every solver pass.

use glam::{Quat, Vec3};

/// Squared length below which a vector is treated as degenerate.
pub const DEGENERATE_LENGTH_SQUARED: f32 = 1.0e-12;

/// Normalizes `v`, falling back to `fallback` when `v` is degenerate or not finite.
pub fn direction_or(v: Vec3, fallback: Vec3) -> Vec3 {
    if v.is_finite() && v.length_squared() > DEGENERATE_LENGTH_SQUARED {
        v.normalize()
    } else {
        fallback
    }
}

/// Moves `point` onto the sphere of radius `distance` around `anchor`, keeping
/// the anchor-to-point direction.
pub fn place_at_distance(anchor: Vec3, point: Vec3, distance: f32, fallback: Vec3) -> Vec3 {
    anchor + direction_or(point - anchor, fallback) * distance
}

/// Shortest-arc rotation taking direction `from` onto direction `to`.
pub fn shortest_arc(from: Vec3, to: Vec3) -> Quat {
    let (Some(from), Some(to)) = (from.try_normalize(), to.try_normalize()) else {
        return Quat::IDENTITY;
    };
    Quat::from_rotation_arc(from, to)
}

/// Removes the component of `v` along the unit vector `normal`.
pub fn reject(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Angle from `from` to `to` measured counter-clockwise about `axis`.
pub fn signed_angle(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    from.cross(to).dot(axis).atan2(from.dot(to))
}

/// Rotates `point` by `angle` about the line through `pivot` along `axis`.
pub fn rotate_about(point: Vec3, pivot: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    match axis.try_normalize() {
        Some(axis) => pivot + Quat::from_axis_angle(axis, angle) * (point - pivot),
        None => point,
    }
}

/// Weighted sum of rotations, normalized.
///
/// Only meaningful while every input lies in the same hemisphere; inputs more
/// than 180 degrees apart can cancel out.
pub fn blend_rotations(rotations: impl IntoIterator<Item = (Quat, f32)>) -> Quat {
    let sum = rotations
        .into_iter()
        .fold(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0), |acc, (q, w)| acc + q * w);
    if sum.length_squared() > DEGENERATE_LENGTH_SQUARED {
        sum.normalize()
    } else {
        Quat::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn place_at_distance_keeps_direction() {
        let p = place_at_distance(Vec3::ZERO, Vec3::new(0.0, 3.0, 4.0), 10.0, Vec3::Y);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 6.0, 8.0), 1e-5));
    }

    #[test]
    fn place_at_distance_uses_fallback_when_coincident() {
        let p = place_at_distance(Vec3::ONE, Vec3::ONE, 2.0, Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(3.0, 1.0, 1.0), 1e-6));
    }

    #[test]
    fn signed_angle_follows_right_hand_rule() {
        assert_relative_eq!(signed_angle(Vec3::X, Vec3::Z, Vec3::Y), -FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(signed_angle(Vec3::Z, Vec3::X, Vec3::Y), FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn shortest_arc_maps_directions() {
        let q = shortest_arc(Vec3::Y, Vec3::new(1.0, 1.0, 0.0));
        assert!((q * Vec3::Y).abs_diff_eq(Vec3::new(1.0, 1.0, 0.0).normalize(), 1e-5));
        assert_eq!(shortest_arc(Vec3::ZERO, Vec3::X), Quat::IDENTITY);
    }

    #[test]
    fn blend_of_identical_rotations_is_that_rotation() {
        let q = Quat::from_rotation_y(0.7);
        let blended = blend_rotations([(q, 1.0), (q, 3.0)]);
        assert!(blended.abs_diff_eq(q, 1e-6));
        assert_eq!(blend_rotations(std::iter::empty()), Quat::IDENTITY);
    }

    #[test]
    fn rotate_about_preserves_distance_to_axis_points() {
        let p = rotate_about(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0), 1.0);
        assert_relative_eq!(p.length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!((p - Vec3::new(1.0, 1.0, 0.0)).length(), 1.0, epsilon = 1e-5);
    }
}

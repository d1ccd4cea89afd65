//! Math utilities module
//!
//! Provides convenient re-exports from glam, the [`Transform`] value type and
//! the small geometric helpers the solvers share.

pub mod geometry;
mod transform;

pub use transform::Transform;

// Re-export commonly used glam types
pub use glam::{Quat, Vec3};

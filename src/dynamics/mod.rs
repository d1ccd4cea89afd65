//! Secondary motion: spring-driven subtrees and rigid subtrees.

pub mod damped;
pub mod solid;

pub use damped::{DampedTransform, DampedTransformParams, SpringPreset};
pub use solid::Solidifier;

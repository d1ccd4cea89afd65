//! # ik-rig
//!
//! A FABRIK-based constraint solver that poses articulated bone hierarchies
//! every tick.
//!
//! ## Features
//! - Weighted multi-chain FABRIK over a full skeleton, not just one chain
//! - Pole (bend direction) and LookAt (facing) orientation constraints
//! - Loop constraints closing cycles the tree cannot express: triangle binds,
//!   forks and quad cages
//! - Rigid subtrees and spring-driven secondary motion
//! - Numeric guards on every bone write, so one bad frame cannot poison the rig
//!
//! ## Example
//! ```rust
//! use glam::Vec3;
//! use ik_rig::{Chain, IkRig, Skeleton, SolverConfig};
//!
//! let mut skeleton = Skeleton::new();
//! let shoulder = skeleton.add_offset("shoulder", None, Vec3::ZERO);
//! let elbow = skeleton.add_offset("elbow", Some(shoulder), Vec3::Y);
//! skeleton.add_offset("wrist", Some(elbow), Vec3::Y);
//!
//! let mut rig = IkRig::new(SolverConfig::default());
//! rig.set_skeleton(&skeleton).unwrap();
//! let wrist = rig.find_bone("wrist").unwrap();
//! let root = rig.find_bone("shoulder").unwrap();
//! rig.add_chain(Chain::builder(wrist, root).target(Vec3::new(1.0, 1.0, 0.0)).build())
//!     .unwrap();
//!
//! let result = rig.tick().unwrap();
//! println!("converged: {}, iterations: {}", result.converged, result.iterations);
//! rig.bake(&mut skeleton).unwrap();
//! ```

pub mod dynamics;
pub mod error;
pub mod ik;
pub mod loops;
pub mod math;
pub mod rig;
pub mod skeleton;

pub use dynamics::{DampedTransform, DampedTransformParams, SpringPreset, Solidifier};
pub use error::{ConfigError, IkError, IkResult, NumericInstability, ResourceError};
pub use ik::{Chain, ChainBuilder, LookAt, Pole, SharedTarget, Side, SolveResult, SolverConfig, TargetPose, TargetProvider};
pub use loops::{Bind, CageBind, ForkBind};
pub use math::Transform;
pub use rig::{ChainHandle, ConstraintRef, Diagnostic, IkRig, LookAtHandle, PoleHandle};
pub use skeleton::{BoneGraph, BoneId, HostSkeleton, RestBone, Skeleton};

//! Chain solving and orientation constraints.
//!
//! Chains pull bones toward targets with FABRIK; Pole and LookAt shape the
//! orientation of the result once the chains have converged.

pub mod chain;
pub mod look_at;
pub mod pole;
pub mod side;
pub mod solver;
pub mod target;

pub use chain::{Chain, ChainBuilder};
pub use look_at::LookAt;
pub use pole::Pole;
pub use side::Side;
pub use solver::{FabrikSolver, PassContext, SolveResult, SolverConfig};
pub use target::{SharedTarget, TargetPose, TargetProvider};

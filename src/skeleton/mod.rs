//! The virtual skeleton: host interface, bones and the bone graph.

pub mod bone;
pub mod graph;
pub mod host;

pub use bone::{Bone, BoneId, LoopAnchor, Modifier, ModifierKind, SpringState};
pub use graph::{Attachment, BoneGraph};
pub use host::{HostSkeleton, RestBone, Skeleton};

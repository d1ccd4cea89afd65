//! Error types for rig configuration and solving.

use thiserror::Error;

use crate::ik::Side;
use crate::rig::ConstraintRef;
use crate::skeleton::{BoneId, ModifierKind};

/// A constraint could not be registered.
///
/// The offending constraint is dropped; every other constraint keeps solving.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The bone id is not part of the current skeleton.
    #[error("bone {0} does not exist in the skeleton")]
    UnknownBone(BoneId),

    /// No bone carries this name.
    #[error("no bone named `{0}`")]
    UnknownBoneName(String),

    /// A chain root must be the tip itself or one of its ancestors.
    #[error("bone {root} is not an ancestor of bone {tip}")]
    NotAnAncestor {
        /// Requested chain root.
        root: BoneId,
        /// Requested chain tip.
        tip: BoneId,
    },

    /// Pole chains need at least one interior joint.
    #[error("pole chain from {tip} to {root} has {len} bones, at least 3 required")]
    PoleChainTooShort {
        /// Pole tip bone.
        tip: BoneId,
        /// Pole root bone.
        root: BoneId,
        /// Number of bones in the chain.
        len: usize,
    },

    /// Poles bend toward lateral axes only.
    #[error("side {0:?} cannot be used as a pole bend direction")]
    InvalidPoleSide(Side),

    /// A solidifier root must have something to carry.
    #[error("solidifier root {0} has no children")]
    SolidifierWithoutChildren(BoneId),

    /// LookAt rotates the bone's parent, so roots cannot look at anything.
    #[error("look-at bone {0} has no parent to pivot around")]
    LookAtWithoutParent(BoneId),

    /// The rest-pose triangle has (almost) no area.
    #[error("bind triangle ({0}, {1}, {2}) is degenerate")]
    DegenerateTriangle(BoneId, BoneId, BoneId),

    /// A loop constraint lists the same bone twice.
    #[error("loop constraint references bone {0} more than once")]
    DuplicateBone(BoneId),

    /// The bone already carries an incompatible modifier.
    #[error("bone {bone} already carries a {existing:?} modifier")]
    ModifierConflict {
        /// Bone that rejected the modifier.
        bone: BoneId,
        /// Modifier already attached.
        existing: ModifierKind,
    },

    /// The handle does not name a registered constraint.
    #[error("{0} is not registered")]
    UnknownConstraint(ConstraintRef),

    /// A tunable is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// The solver has nothing valid to work on. Ticks fail closed until the rig
/// is given a usable skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// No skeleton has been assigned, or the last assignment failed.
    #[error("no skeleton assigned")]
    NoSkeleton,

    /// The host skeleton has zero bones.
    #[error("skeleton has no bones")]
    EmptySkeleton,

    /// A bone points at a parent index that does not exist.
    #[error("bone {bone} references missing parent {parent}")]
    MissingParent {
        /// Index of the bone.
        bone: usize,
        /// Parent index it references.
        parent: usize,
    },

    /// The parent links do not form a forest.
    #[error("skeleton hierarchy contains a cycle")]
    CyclicHierarchy,

    /// The rest transform of a bone contains NaN or infinity.
    #[error("rest pose of bone {0} is not finite")]
    InvalidRestPose(usize),

    /// The host handed to `bake` is not the skeleton the rig was built from.
    #[error("host skeleton has {found} bones, rig expects {expected}")]
    SkeletonMismatch {
        /// Bones in the rig's graph.
        expected: usize,
        /// Bones in the host.
        found: usize,
    },
}

/// A write the bone graph refused and replaced with a safe value.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum NumericInstability {
    /// Position contained NaN or infinity; the last good position was kept.
    #[error("non-finite position written to bone {0}")]
    NonFinitePosition(BoneId),

    /// Rotation contained NaN or infinity; the last good rotation was kept.
    #[error("non-finite rotation written to bone {0}")]
    NonFiniteRotation(BoneId),

    /// Rotation was not unit length; identity was used instead.
    #[error("non-unit rotation written to bone {bone} (|q|^2 = {length_squared})")]
    NonUnitRotation {
        /// Bone that received the write.
        bone: BoneId,
        /// Squared magnitude of the rejected quaternion.
        length_squared: f32,
    },

    /// Backward-pass weight was not a positive finite number; the write was dropped.
    #[error("invalid chain weight {weight} written to bone {bone}")]
    InvalidWeight {
        /// Bone that received the write.
        bone: BoneId,
        /// Rejected weight.
        weight: f32,
    },

    /// Length multiplier was not a positive finite number.
    #[error("invalid length multiplier {value} for bone {bone}")]
    InvalidLengthMultiplier {
        /// Bone that received the write.
        bone: BoneId,
        /// Rejected multiplier.
        value: f32,
    },
}

/// Any error surfaced by [`crate::IkRig`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IkError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Result type for rig operations.
pub type IkResult<T> = Result<T, IkError>;

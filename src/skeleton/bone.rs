use glam::{Quat, Vec3};
use std::fmt;

use crate::math::Transform;

/// Stable handle of a bone: its index in the host skeleton's bone list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(usize);

impl BoneId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for BoneId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for BoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    None,
    Bind,
    ForkBind,
    CageBind,
    Solid,
    DampedTransform,
    LookAt,
}

/// Loop constraints anchored at a bone, by index into their registries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopAnchor {
    pub binds: Vec<usize>,
    pub forks: Vec<usize>,
    pub cages: Vec<usize>,
}

impl LoopAnchor {
    pub fn is_empty(&self) -> bool {
        self.binds.is_empty() && self.forks.is_empty() && self.cages.is_empty()
    }

    /// Most specific kind present, for diagnostics.
    pub fn kind(&self) -> ModifierKind {
        if !self.cages.is_empty() {
            ModifierKind::CageBind
        } else if !self.binds.is_empty() {
            ModifierKind::Bind
        } else if !self.forks.is_empty() {
            ModifierKind::ForkBind
        } else {
            ModifierKind::None
        }
    }
}

/// Spring state of one bone inside a DampedTransform subtree, with the
/// per-depth attenuation already folded into the parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringState {
    pub velocity: Vec3,
    pub stiffness: f32,
    pub damping: f32,
    pub mass: f32,
    pub gravity: f32,
}

/// The single modifier payload a bone can carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Modifier {
    #[default]
    None,
    Loop(LoopAnchor),
    Solid {
        master: BoneId,
    },
    Damped {
        master: BoneId,
        spring: SpringState,
    },
    LookAt {
        master: BoneId,
    },
}

impl Modifier {
    pub fn kind(&self) -> ModifierKind {
        match self {
            Modifier::None => ModifierKind::None,
            Modifier::Loop(anchor) => anchor.kind(),
            Modifier::Solid { .. } => ModifierKind::Solid,
            Modifier::Damped { .. } => ModifierKind::DampedTransform,
            Modifier::LookAt { .. } => ModifierKind::LookAt,
        }
    }

    /// Root of the subtree a tree-structural modifier was propagated from.
    pub fn master(&self) -> Option<BoneId> {
        match self {
            Modifier::Solid { master }
            | Modifier::Damped { master, .. }
            | Modifier::LookAt { master } => Some(*master),
            Modifier::None | Modifier::Loop(_) => None,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, Modifier::Loop(_))
    }
}

#[derive(Debug, Clone)]
pub struct Bone {
    pub(crate) id: BoneId,
    pub(crate) name: String,
    pub(crate) parent: Option<BoneId>,
    pub(crate) children: Vec<BoneId>,
    pub(crate) position: Vec3,
    pub(crate) rotation: Quat,
    pub(crate) length: f32,
    pub(crate) length_multiplier: f32,
    pub(crate) start_direction: Vec3,
    pub(crate) start_rotation: Quat,
    pub(crate) rest_position: Vec3,
    pub(crate) rest_scale: Vec3,
    pub(crate) rest_local: Transform,
    pub(crate) modifier: Modifier,
    pub(crate) look_at_pivot: bool,
    pub(crate) weighted_position_sum: Vec3,
    pub(crate) weight_sum: f32,
    pub(crate) orientation_pinned: bool,
    pub(crate) pole_twist: Option<(BoneId, f32)>,
}

impl Bone {
    pub fn id(&self) -> BoneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<BoneId> {
        self.parent
    }

    pub fn children(&self) -> &[BoneId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Rest distance to the parent, before the runtime multiplier.
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn length_multiplier(&self) -> f32 {
        self.length_multiplier
    }

    /// Distance to the parent the solvers enforce.
    pub fn effective_length(&self) -> f32 {
        self.length * self.length_multiplier
    }

    /// Normalized rest-pose direction from the parent to this bone.
    pub fn start_direction(&self) -> Vec3 {
        self.start_direction
    }

    /// Rest-pose orientation in solver space.
    pub fn start_rotation(&self) -> Quat {
        self.start_rotation
    }

    pub fn rest_position(&self) -> Vec3 {
        self.rest_position
    }

    pub fn modifier(&self) -> &Modifier {
        &self.modifier
    }

    pub fn weight_sum(&self) -> f32 {
        self.weight_sum
    }

    pub fn weighted_position_sum(&self) -> Vec3 {
        self.weighted_position_sum
    }

    pub fn spring(&self) -> Option<&SpringState> {
        match &self.modifier {
            Modifier::Damped { spring, .. } => Some(spring),
            _ => None,
        }
    }
}

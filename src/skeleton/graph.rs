use glam::{Quat, Vec3};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::ops::Index;

use super::bone::{Bone, BoneId, LoopAnchor, Modifier, ModifierKind, SpringState};
use super::host::{HostSkeleton, RestBone};
use crate::dynamics::DampedTransformParams;
use crate::error::{ConfigError, NumericInstability, ResourceError};
use crate::math::geometry::{direction_or, shortest_arc};
use crate::math::Transform;

/// Rotations further than this from unit length are replaced with identity.
pub const UNIT_ROTATION_TOLERANCE: f32 = 1.0e-3;

/// What [`BoneGraph::set_modifier`] attaches to a bone.
#[derive(Debug, Clone, Copy)]
pub enum Attachment<'a> {
    Bind(usize),
    ForkBind(usize),
    CageBind(usize),
    Solid,
    DampedTransform(&'a DampedTransformParams),
    LookAt,
}

impl Attachment<'_> {
    fn kind(&self) -> ModifierKind {
        match self {
            Attachment::Bind(_) => ModifierKind::Bind,
            Attachment::ForkBind(_) => ModifierKind::ForkBind,
            Attachment::CageBind(_) => ModifierKind::CageBind,
            Attachment::Solid => ModifierKind::Solid,
            Attachment::DampedTransform(_) => ModifierKind::DampedTransform,
            Attachment::LookAt => ModifierKind::LookAt,
        }
    }
}

/// The solver's own copy of the bone hierarchy.
///
/// Positions and rotations live in solver space (the skeleton's space). All
/// writes go through setters that refuse non-finite values, so a single bad
/// frame cannot poison later ticks.
#[derive(Debug, Clone)]
pub struct BoneGraph {
    bones: Vec<Bone>,
    roots: Vec<BoneId>,
    breadth_first: Vec<BoneId>,
    rank: Vec<usize>,
    names: HashMap<String, BoneId>,
    rejected_writes: u64,
    last_rejection: Option<NumericInstability>,
}

impl BoneGraph {
    pub fn from_host<H: HostSkeleton + ?Sized>(host: &H) -> Result<Self, ResourceError> {
        Self::from_rest_bones(&host.rest_bones())
    }

    pub fn from_rest_bones(rest: &[RestBone]) -> Result<Self, ResourceError> {
        if rest.is_empty() {
            return Err(ResourceError::EmptySkeleton);
        }

        let count = rest.len();
        let mut children: Vec<Vec<BoneId>> = vec![Vec::new(); count];
        let mut roots = Vec::new();
        for (index, bone) in rest.iter().enumerate() {
            if !bone.rest.is_finite() {
                return Err(ResourceError::InvalidRestPose(index));
            }
            match bone.parent {
                Some(parent) if parent >= count || parent == index => {
                    return Err(ResourceError::MissingParent { bone: index, parent });
                }
                Some(parent) => children[parent].push(BoneId::new(index)),
                None => roots.push(BoneId::new(index)),
            }
        }

        let mut breadth_first = Vec::with_capacity(count);
        let mut queue: VecDeque<BoneId> = roots.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            breadth_first.push(id);
            queue.extend(children[id.index()].iter().copied());
        }
        if breadth_first.len() != count {
            return Err(ResourceError::CyclicHierarchy);
        }

        let mut rank = vec![0; count];
        for (order, id) in breadth_first.iter().enumerate() {
            rank[id.index()] = order;
        }

        let mut globals = vec![Transform::IDENTITY; count];
        for id in &breadth_first {
            let local = &rest[id.index()].rest;
            globals[id.index()] = match rest[id.index()].parent {
                Some(parent) => globals[parent].mul_transform(local),
                None => Transform::new(local.position, local.rotation.normalize(), local.scale),
            };
        }

        let mut names = HashMap::with_capacity(count);
        let mut bones = Vec::with_capacity(count);
        for (index, bone) in rest.iter().enumerate() {
            let id = BoneId::new(index);
            match names.entry(bone.name.clone()) {
                Entry::Occupied(first) => {
                    log::warn!("duplicate bone name `{}`; lookups resolve to {}", bone.name, first.get());
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
            let global = globals[index];
            let offset = bone
                .parent
                .map_or(Vec3::ZERO, |parent| global.position - globals[parent].position);
            bones.push(Bone {
                id,
                name: bone.name.clone(),
                parent: bone.parent.map(BoneId::new),
                children: std::mem::take(&mut children[index]),
                position: global.position,
                rotation: global.rotation,
                length: offset.length(),
                length_multiplier: 1.0,
                start_direction: direction_or(offset, Vec3::Y),
                start_rotation: global.rotation,
                rest_position: global.position,
                rest_scale: global.scale,
                rest_local: bone.rest,
                modifier: Modifier::None,
                look_at_pivot: false,
                weighted_position_sum: Vec3::ZERO,
                weight_sum: 0.0,
                orientation_pinned: false,
                pole_twist: None,
            });
        }

        Ok(Self {
            bones,
            roots,
            breadth_first,
            rank,
            names,
            rejected_writes: 0,
            last_rejection: None,
        })
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn contains(&self, id: BoneId) -> bool {
        id.index() < self.bones.len()
    }

    pub fn bone(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id.index())
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn find(&self, name: &str) -> Option<BoneId> {
        self.names.get(name).copied()
    }

    pub fn roots(&self) -> &[BoneId] {
        &self.roots
    }

    /// Every bone, parents before children, roots in host order.
    pub fn breadth_first(&self) -> &[BoneId] {
        &self.breadth_first
    }

    /// Position of the bone in [`BoneGraph::breadth_first`].
    pub fn rank(&self, id: BoneId) -> usize {
        self.rank[id.index()]
    }

    pub fn parent(&self, id: BoneId) -> Option<BoneId> {
        self[id].parent
    }

    pub fn children(&self, id: BoneId) -> &[BoneId] {
        &self[id].children
    }

    pub fn position(&self, id: BoneId) -> Vec3 {
        self[id].position
    }

    pub fn rotation(&self, id: BoneId) -> Quat {
        self[id].rotation
    }

    /// Number of writes replaced with a safe value since the graph was built.
    pub fn rejected_writes(&self) -> u64 {
        self.rejected_writes
    }

    pub fn check(&self, id: BoneId) -> Result<(), ConfigError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(ConfigError::UnknownBone(id))
        }
    }

    pub fn set_position(&mut self, id: BoneId, position: Vec3) {
        if position.is_finite() {
            self.bones[id.index()].position = position;
        } else {
            self.reject(NumericInstability::NonFinitePosition(id));
        }
    }

    pub fn set_rotation(&mut self, id: BoneId, rotation: Quat) {
        if !rotation.is_finite() {
            self.reject(NumericInstability::NonFiniteRotation(id));
            return;
        }
        let length_squared = rotation.length_squared();
        if (length_squared - 1.0).abs() > UNIT_ROTATION_TOLERANCE {
            self.reject(NumericInstability::NonUnitRotation { bone: id, length_squared });
            self.bones[id.index()].rotation = Quat::IDENTITY;
            return;
        }
        self.bones[id.index()].rotation = rotation;
    }

    pub fn set_length_multiplier(&mut self, id: BoneId, value: f32) {
        if value.is_finite() && value > 0.0 {
            self.bones[id.index()].length_multiplier = value;
        } else {
            self.reject(NumericInstability::InvalidLengthMultiplier { bone: id, value });
        }
    }

    /// Most recent write the graph refused.
    pub fn last_rejection(&self) -> Option<NumericInstability> {
        self.last_rejection
    }

    fn reject(&mut self, issue: NumericInstability) {
        self.rejected_writes += 1;
        self.last_rejection = Some(issue);
        log::warn!("{issue}");
    }

    /// True when `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: BoneId, id: BoneId) -> bool {
        let mut current = Some(id);
        while let Some(bone) = current {
            if bone == ancestor {
                return true;
            }
            current = self[bone].parent;
        }
        false
    }

    /// Bones from `tip` up to and including `root`.
    pub fn path(&self, tip: BoneId, root: BoneId) -> Result<Vec<BoneId>, ConfigError> {
        self.check(tip)?;
        self.check(root)?;
        let mut path = Vec::new();
        let mut current = Some(tip);
        while let Some(id) = current {
            path.push(id);
            if id == root {
                return Ok(path);
            }
            current = self[id].parent;
        }
        Err(ConfigError::NotAnAncestor { root, tip })
    }

    /// `id` and all its descendants, breadth first.
    pub fn subtree(&self, id: BoneId) -> Vec<BoneId> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(bone) = queue.pop_front() {
            out.push(bone);
            queue.extend(self[bone].children.iter().copied());
        }
        out
    }

    /// Swing the bone's segment has undergone since the rest pose.
    ///
    /// Roots have no segment; their own rotation delta is used instead.
    pub fn segment_swing(&self, id: BoneId) -> Quat {
        let bone = &self[id];
        match bone.parent {
            Some(parent) => shortest_arc(
                bone.start_direction,
                bone.position - self[parent].position,
            ),
            None => (bone.rotation * bone.start_rotation.inverse()).normalize(),
        }
    }

    /// Rotation delta of the bone relative to its rest orientation.
    pub fn rotation_delta(&self, id: BoneId) -> Quat {
        let bone = &self[id];
        (bone.rotation * bone.start_rotation.inverse()).normalize()
    }

    /// Adds one weighted write to the backward-pass accumulator and moves the
    /// bone to the running weighted average.
    pub fn accumulate(&mut self, id: BoneId, position: Vec3, weight: f32) -> Vec3 {
        if !position.is_finite() {
            self.reject(NumericInstability::NonFinitePosition(id));
            return self[id].position;
        }
        if !weight.is_finite() || weight <= 0.0 {
            self.reject(NumericInstability::InvalidWeight { bone: id, weight });
            return self[id].position;
        }
        let bone = &mut self.bones[id.index()];
        bone.weighted_position_sum += position * weight;
        bone.weight_sum += weight;
        let average = bone.weighted_position_sum / bone.weight_sum;
        self.set_position(id, average);
        self[id].position
    }

    pub fn wipe_weights(&mut self) {
        for bone in &mut self.bones {
            bone.weighted_position_sum = Vec3::ZERO;
            bone.weight_sum = 0.0;
        }
    }

    pub fn wipe_modifiers(&mut self) {
        for bone in &mut self.bones {
            bone.modifier = Modifier::None;
            bone.look_at_pivot = false;
        }
    }

    /// Attaches a modifier.
    ///
    /// Loop kinds register the constraint index on `id` alone. Tree kinds
    /// flag the whole subtree rooted at `id` and record `id` as its master.
    pub fn set_modifier(&mut self, id: BoneId, attachment: Attachment<'_>) -> Result<(), ConfigError> {
        self.check(id)?;
        match attachment {
            Attachment::Bind(index) | Attachment::ForkBind(index) | Attachment::CageBind(index) => {
                let bone = &mut self.bones[id.index()];
                let existing = bone.modifier.kind();
                if matches!(bone.modifier, Modifier::None) {
                    bone.modifier = Modifier::Loop(LoopAnchor::default());
                }
                let Modifier::Loop(anchor) = &mut bone.modifier else {
                    return Err(ConfigError::ModifierConflict { bone: id, existing });
                };
                match attachment {
                    Attachment::Bind(_) => anchor.binds.push(index),
                    Attachment::ForkBind(_) => anchor.forks.push(index),
                    _ => anchor.cages.push(index),
                }
                Ok(())
            }
            Attachment::Solid | Attachment::DampedTransform(_) | Attachment::LookAt => {
                self.propagate(id, attachment)
            }
        }
    }

    fn propagate(&mut self, master: BoneId, attachment: Attachment<'_>) -> Result<(), ConfigError> {
        let pivot = self[master].parent;
        if matches!(attachment, Attachment::LookAt) && pivot.is_none() {
            return Err(ConfigError::LookAtWithoutParent(master));
        }
        if let (Attachment::LookAt, Some(pivot)) = (attachment, pivot) {
            // One pivot rotation can only face one target.
            if self[pivot].look_at_pivot {
                return Err(ConfigError::ModifierConflict {
                    bone: pivot,
                    existing: ModifierKind::LookAt,
                });
            }
        }

        let mut levels = vec![(master, 0u32)];
        let mut cursor = 0;
        while cursor < levels.len() {
            let (bone, depth) = levels[cursor];
            cursor += 1;
            let existing = self[bone].modifier.kind();
            if existing != ModifierKind::None {
                log::debug!("{:?} on {} blocked by {:?} on {}", attachment.kind(), master, existing, bone);
                return Err(ConfigError::ModifierConflict { bone, existing });
            }
            levels.extend(self[bone].children.iter().map(|&child| (child, depth + 1)));
        }

        for (bone, depth) in levels {
            self.bones[bone.index()].modifier = match attachment {
                Attachment::Solid => Modifier::Solid { master },
                Attachment::LookAt => Modifier::LookAt { master },
                Attachment::DampedTransform(params) => Modifier::Damped {
                    master,
                    spring: params.spring_at_depth(depth),
                },
                _ => unreachable!("loop attachments are not propagated"),
            };
        }
        if let (Attachment::LookAt, Some(pivot)) = (attachment, pivot) {
            self.bones[pivot.index()].look_at_pivot = true;
        }
        Ok(())
    }

    /// Velocity of every spring bone, keyed by bone and the master it hangs from.
    pub(crate) fn spring_velocities(&self) -> Vec<(BoneId, BoneId, Vec3)> {
        self.bones
            .iter()
            .filter_map(|bone| match bone.modifier {
                Modifier::Damped { master, spring } => Some((bone.id, master, spring.velocity)),
                _ => None,
            })
            .collect()
    }

    /// Puts velocities back on bones still driven by the same master.
    /// Springs that changed hands keep the zero velocity they were attached with.
    pub(crate) fn restore_spring_velocities(&mut self, saved: &[(BoneId, BoneId, Vec3)]) {
        for &(id, owner, velocity) in saved {
            let Some(bone) = self.bones.get_mut(id.index()) else {
                continue;
            };
            if let Modifier::Damped { master, spring } = &mut bone.modifier {
                if *master == owner {
                    spring.velocity = velocity;
                }
            }
        }
    }

    pub fn is_look_at_pivot(&self, id: BoneId) -> bool {
        self[id].look_at_pivot
    }

    pub(crate) fn set_spring(&mut self, id: BoneId, state: SpringState) {
        if let Modifier::Damped { spring, .. } = &mut self.bones[id.index()].modifier {
            *spring = if state.velocity.is_finite() {
                state
            } else {
                SpringState {
                    velocity: Vec3::ZERO,
                    ..state
                }
            };
        }
    }

    pub(crate) fn pin_orientation(&mut self, id: BoneId) {
        self.bones[id.index()].orientation_pinned = true;
    }

    pub(crate) fn set_pole_twist(&mut self, id: BoneId, toward: BoneId, angle: f32) {
        if angle.is_finite() {
            self.bones[id.index()].pole_twist = Some((toward, angle));
        }
    }

    /// Clears per-tick orientation ownership.
    pub(crate) fn begin_tick(&mut self) {
        for bone in &mut self.bones {
            bone.orientation_pinned = false;
            bone.pole_twist = None;
        }
    }

    /// Puts every bone back in its rest pose and zeroes spring velocities.
    pub fn reset_to_rest(&mut self) {
        for bone in &mut self.bones {
            bone.position = bone.rest_position;
            bone.rotation = bone.start_rotation;
            bone.weighted_position_sum = Vec3::ZERO;
            bone.weight_sum = 0.0;
            bone.orientation_pinned = false;
            bone.pole_twist = None;
            if let Modifier::Damped { spring, .. } = &mut bone.modifier {
                spring.velocity = Vec3::ZERO;
            }
        }
    }

    pub fn global_transform(&self, id: BoneId) -> Transform {
        let bone = &self[id];
        Transform::new(bone.position, bone.rotation, bone.rest_scale)
    }

    /// Solved pose of the bone in its parent's space, ready for baking.
    pub fn local_pose(&self, id: BoneId) -> Transform {
        let bone = &self[id];
        match bone.parent {
            Some(parent) => {
                let relative = self.global_transform(id).relative_to(&self.global_transform(parent));
                Transform::new(relative.position, relative.rotation, bone.rest_local.scale)
            }
            None => Transform::new(bone.position, bone.rotation, bone.rest_local.scale),
        }
    }

    pub fn local_poses(&self) -> Vec<Transform> {
        self.bones.iter().map(|bone| self.local_pose(bone.id)).collect()
    }
}

impl Index<BoneId> for BoneGraph {
    type Output = Bone;

    fn index(&self, id: BoneId) -> &Bone {
        &self.bones[id.index()]
    }
}

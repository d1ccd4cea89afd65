use glam::{Quat, Vec3};

use crate::error::ConfigError;
use crate::math::geometry::{direction_or, place_at_distance, reject};
use crate::skeleton::{BoneGraph, BoneId, Modifier, SpringState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpringPreset {
    /// Barely moves away from the rest pose.
    Stiff,
    /// Loose and slow to settle.
    Floppy,
    /// Stiff base tapering to a loose tip.
    Tail,
    /// Light, heavily damped strands that sag.
    Hair,
}

impl SpringPreset {
    pub fn params(self) -> DampedTransformParams {
        let base = DampedTransformParams::default();
        match self {
            SpringPreset::Stiff => base.with_stiffness(0.6).with_damping(0.9).with_mass(1.0),
            SpringPreset::Floppy => base.with_stiffness(0.05).with_damping(0.5).with_mass(0.8),
            SpringPreset::Tail => base
                .with_stiffness(0.4)
                .with_stiffness_passed_down(0.7)
                .with_mass_passed_down(0.9),
            SpringPreset::Hair => base
                .with_stiffness(0.08)
                .with_damping(0.85)
                .with_mass(0.3)
                .with_gravity(0.02),
        }
    }
}

/// Physics parameters of a DampedTransform subtree.
///
/// The `*_passed_down` factors multiply the matching parameter once per
/// hierarchy level below the first spring level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DampedTransformParams {
    pub stiffness: f32,
    pub damping: f32,
    pub mass: f32,
    pub gravity: f32,
    pub stiffness_passed_down: f32,
    pub damping_passed_down: f32,
    pub mass_passed_down: f32,
}

impl Default for DampedTransformParams {
    fn default() -> Self {
        Self {
            stiffness: 0.1,
            damping: 0.75,
            mass: 0.9,
            gravity: 0.0,
            stiffness_passed_down: 1.0,
            damping_passed_down: 1.0,
            mass_passed_down: 1.0,
        }
    }
}

impl DampedTransformParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_preset(preset: SpringPreset) -> Self {
        preset.params()
    }

    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_stiffness_passed_down(mut self, factor: f32) -> Self {
        self.stiffness_passed_down = factor;
        self
    }

    pub fn with_damping_passed_down(mut self, factor: f32) -> Self {
        self.damping_passed_down = factor;
        self
    }

    pub fn with_mass_passed_down(mut self, factor: f32) -> Self {
        self.mass_passed_down = factor;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            self.stiffness,
            self.damping,
            self.mass,
            self.gravity,
            self.stiffness_passed_down,
            self.damping_passed_down,
            self.mass_passed_down,
        ];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidParameter(
                "damped transform parameters must be finite".into(),
            ));
        }
        if self.mass <= 0.0 || self.mass_passed_down <= 0.0 {
            return Err(ConfigError::InvalidParameter(format!(
                "damped transform mass must be positive, got {} (x{} per level)",
                self.mass, self.mass_passed_down
            )));
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(ConfigError::InvalidParameter(format!(
                "damped transform damping must lie in [0, 1], got {}",
                self.damping
            )));
        }
        Ok(())
    }

    /// Spring state for a bone `depth` levels below the subtree root, with
    /// zero velocity.
    pub fn spring_at_depth(&self, depth: u32) -> SpringState {
        let levels = depth.saturating_sub(1) as i32;
        SpringState {
            velocity: Vec3::ZERO,
            stiffness: self.stiffness * self.stiffness_passed_down.powi(levels),
            damping: (self.damping * self.damping_passed_down.powi(levels)).clamp(0.0, 1.0),
            mass: self.mass * self.mass_passed_down.powi(levels),
            gravity: self.gravity,
        }
    }
}

/// Spring-driven secondary motion for every bone below `root`.
#[derive(Debug, Clone, PartialEq)]
pub struct DampedTransform {
    pub root: BoneId,
    pub params: DampedTransformParams,
}

impl DampedTransform {
    pub fn new(root: BoneId, params: DampedTransformParams) -> Self {
        Self { root, params }
    }

    pub fn validate(&self, graph: &BoneGraph) -> Result<(), ConfigError> {
        graph.check(self.root)?;
        self.params.validate()?;
        if graph.children(self.root).is_empty() {
            log::warn!("damped transform on leaf bone {} has nothing to move", self.root);
        }
        Ok(())
    }
}

/// Frame the spring's rest offsets are carried by.
///
/// A root master has no segment of its own, and its derived rotation follows
/// the springs below it, so its subtree springs toward the plain rest pose.
pub(crate) fn rest_frame(graph: &BoneGraph, master: BoneId) -> Quat {
    if graph.parent(master).is_some() {
        graph.segment_swing(master)
    } else {
        Quat::IDENTITY
    }
}

/// Advances the spring of `id` by one step and writes its new position.
///
/// The spring pulls toward the rest offset from `parent`, carried by the
/// subtree root's segment swing; the result is kept at the bone's length.
pub(crate) fn integrate(graph: &mut BoneGraph, id: BoneId, parent: BoneId, master: BoneId) {
    let Modifier::Damped { spring, .. } = graph[id].modifier() else {
        return;
    };
    let mut spring = *spring;
    let frame = rest_frame(graph, master);
    let bone = &graph[id];
    let length = bone.effective_length();
    let start_direction = bone.start_direction();
    let current = bone.position();
    let anchor = graph.position(parent);

    let target = anchor + frame * start_direction * length;
    let mut force = (target - current) * spring.stiffness;
    force.y -= spring.gravity;
    let acceleration = force / spring.mass;
    spring.velocity += acceleration * (1.0 - spring.damping);

    let next = place_at_distance(anchor, current + spring.velocity + force, length, frame * start_direction);
    // The length constraint absorbs the radial part of the motion.
    spring.velocity = reject(spring.velocity, direction_or(next - anchor, start_direction));

    graph.set_position(id, next);
    graph.set_spring(id, spring);
}

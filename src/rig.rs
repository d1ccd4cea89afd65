//! The orchestrator: owns the bone graph and every constraint, and sequences
//! one solve per tick.

use glam::Vec3;
use std::collections::HashMap;
use std::fmt;

use crate::dynamics::{DampedTransform, Solidifier};
use crate::error::{ConfigError, IkError, IkResult, ResourceError};
use crate::ik::{Chain, FabrikSolver, LookAt, PassContext, Pole, SolveResult, SolverConfig, TargetPose, TargetProvider};
use crate::loops::{anchor_of, link_corrections, Bind, CageBind, ForkBind, LoopConstraints};
use crate::skeleton::{Attachment, BoneGraph, BoneId, HostSkeleton};

/// A registered constraint and whether it currently takes part in solving.
#[derive(Debug, Clone)]
pub struct Slot<T> {
    pub item: T,
    pub active: bool,
}

impl<T> Slot<T> {
    pub fn new(item: T) -> Self {
        Self { item, active: true }
    }
}

/// Registry entry of a constraint, by kind and registration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintRef {
    Chain(usize),
    Pole(usize),
    LookAt(usize),
    Bind(usize),
    ForkBind(usize),
    CageBind(usize),
    Solidifier(usize),
    DampedTransform(usize),
}

impl fmt::Display for ConstraintRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintRef::Chain(i) => write!(f, "chain {i}"),
            ConstraintRef::Pole(i) => write!(f, "pole {i}"),
            ConstraintRef::LookAt(i) => write!(f, "look-at {i}"),
            ConstraintRef::Bind(i) => write!(f, "bind {i}"),
            ConstraintRef::ForkBind(i) => write!(f, "fork bind {i}"),
            ConstraintRef::CageBind(i) => write!(f, "cage bind {i}"),
            ConstraintRef::Solidifier(i) => write!(f, "solidifier {i}"),
            ConstraintRef::DampedTransform(i) => write!(f, "damped transform {i}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoleHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookAtHandle(usize);

/// A constraint that was deactivated when the skeleton was (re)assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub constraint: ConstraintRef,
    pub error: ConfigError,
}

/// Poses a skeleton every tick from its registered constraints.
///
/// Constraints are validated when registered and again whenever a new
/// skeleton is assigned. A constraint that fails validation is dropped at
/// registration, or deactivated on reassignment, without affecting the rest.
#[derive(Debug, Clone)]
pub struct IkRig {
    config: SolverConfig,
    enabled: bool,
    graph: Option<BoneGraph>,
    anchors: HashMap<BoneId, Vec3>,
    chains: Vec<Slot<Chain>>,
    poles: Vec<Slot<Pole>>,
    look_ats: Vec<Slot<LookAt>>,
    loops: LoopConstraints,
    solidifiers: Vec<Slot<Solidifier>>,
    damped: Vec<Slot<DampedTransform>>,
    diagnostics: Vec<Diagnostic>,
}

impl Default for IkRig {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl IkRig {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            enabled: true,
            graph: None,
            anchors: HashMap::new(),
            chains: Vec::new(),
            poles: Vec::new(),
            look_ats: Vec::new(),
            loops: LoopConstraints::default(),
            solidifiers: Vec::new(),
            damped: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Replaces the solver configuration. Invalid configurations are refused
    /// and the current one is kept.
    pub fn set_config(&mut self, config: SolverConfig) -> IkResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn graph(&self) -> Option<&BoneGraph> {
        self.graph.as_ref()
    }

    pub fn find_bone(&self, name: &str) -> Option<BoneId> {
        self.graph.as_ref()?.find(name)
    }

    /// Constraints deactivated by the last skeleton assignment.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn graph_ref(&self) -> Result<&BoneGraph, ResourceError> {
        self.graph.as_ref().ok_or(ResourceError::NoSkeleton)
    }

    fn graph_mut(&mut self) -> Result<&mut BoneGraph, ResourceError> {
        self.graph.as_mut().ok_or(ResourceError::NoSkeleton)
    }

    /// Rebuilds the bone graph from `host` and re-validates every registered
    /// constraint against it.
    ///
    /// On failure the rig is left without a skeleton and ticks fail closed.
    pub fn set_skeleton<H: HostSkeleton + ?Sized>(&mut self, host: &H) -> IkResult<()> {
        self.anchors.clear();
        self.diagnostics.clear();
        let graph = match BoneGraph::from_host(host) {
            Ok(graph) => graph,
            Err(err) => {
                self.graph = None;
                log::warn!("skeleton rejected: {err}");
                return Err(err.into());
            }
        };
        log::debug!("skeleton assigned: {} bones, {} roots", graph.len(), graph.roots().len());

        let mut failures = Vec::new();
        revalidate(&mut self.chains, &mut failures, ConstraintRef::Chain, |c| c.resolve(&graph));
        revalidate(&mut self.poles, &mut failures, ConstraintRef::Pole, |p| p.resolve(&graph));
        revalidate(&mut self.look_ats, &mut failures, ConstraintRef::LookAt, |l| l.resolve(&graph));
        revalidate(&mut self.loops.binds, &mut failures, ConstraintRef::Bind, |b| b.resolve(&graph));
        revalidate(&mut self.loops.forks, &mut failures, ConstraintRef::ForkBind, |f| f.resolve(&graph));
        revalidate(&mut self.loops.cages, &mut failures, ConstraintRef::CageBind, |c| c.resolve(&graph));
        revalidate(&mut self.solidifiers, &mut failures, ConstraintRef::Solidifier, |s| s.validate(&graph));
        revalidate(&mut self.damped, &mut failures, ConstraintRef::DampedTransform, |d| d.validate(&graph));

        self.graph = Some(graph);
        let conflicts = self.attach_modifiers();
        if !conflicts.is_empty() {
            for conflict in &conflicts {
                self.deactivate(conflict.constraint);
            }
            self.attach_modifiers();
        }
        failures.extend(conflicts);
        for failure in &failures {
            log::warn!("{} deactivated: {}", failure.constraint, failure.error);
        }
        self.diagnostics = failures;
        Ok(())
    }

    /// Drops every constraint and clears all modifier state from the graph.
    pub fn clear_constraints(&mut self) {
        self.chains.clear();
        self.poles.clear();
        self.look_ats.clear();
        self.loops.clear();
        self.solidifiers.clear();
        self.damped.clear();
        self.diagnostics.clear();
        if let Some(graph) = self.graph.as_mut() {
            graph.wipe_modifiers();
            graph.wipe_weights();
        }
    }

    pub fn add_chain(&mut self, mut chain: Chain) -> IkResult<ChainHandle> {
        let graph = self.graph_ref()?;
        rejected(ConstraintRef::Chain(self.chains.len()), chain.resolve(graph))?;
        self.chains.push(Slot::new(chain));
        Ok(ChainHandle(self.chains.len() - 1))
    }

    pub fn add_pole(&mut self, mut pole: Pole) -> IkResult<PoleHandle> {
        let graph = self.graph_ref()?;
        rejected(ConstraintRef::Pole(self.poles.len()), pole.resolve(graph))?;
        self.poles.push(Slot::new(pole));
        Ok(PoleHandle(self.poles.len() - 1))
    }

    pub fn add_look_at(&mut self, look_at: LookAt) -> IkResult<LookAtHandle> {
        let graph = self.graph_ref()?;
        let constraint = ConstraintRef::LookAt(self.look_ats.len());
        rejected(constraint, look_at.resolve(graph))?;
        self.look_ats.push(Slot::new(look_at));
        self.commit(constraint)?;
        Ok(LookAtHandle(self.look_ats.len() - 1))
    }

    pub fn add_bind(&mut self, mut bind: Bind) -> IkResult<usize> {
        let graph = self.graph_ref()?;
        let constraint = ConstraintRef::Bind(self.loops.binds.len());
        rejected(constraint, bind.resolve(graph))?;
        self.loops.binds.push(Slot::new(bind));
        self.commit(constraint)?;
        Ok(self.loops.binds.len() - 1)
    }

    pub fn add_fork_bind(&mut self, mut fork: ForkBind) -> IkResult<usize> {
        let graph = self.graph_ref()?;
        let constraint = ConstraintRef::ForkBind(self.loops.forks.len());
        rejected(constraint, fork.resolve(graph))?;
        self.loops.forks.push(Slot::new(fork));
        self.commit(constraint)?;
        Ok(self.loops.forks.len() - 1)
    }

    pub fn add_cage_bind(&mut self, mut cage: CageBind) -> IkResult<usize> {
        let graph = self.graph_ref()?;
        let constraint = ConstraintRef::CageBind(self.loops.cages.len());
        rejected(constraint, cage.resolve(graph))?;
        self.loops.cages.push(Slot::new(cage));
        self.commit(constraint)?;
        Ok(self.loops.cages.len() - 1)
    }

    pub fn add_solidifier(&mut self, solidifier: Solidifier) -> IkResult<usize> {
        let graph = self.graph_ref()?;
        let constraint = ConstraintRef::Solidifier(self.solidifiers.len());
        rejected(constraint, solidifier.validate(graph))?;
        self.solidifiers.push(Slot::new(solidifier));
        self.commit(constraint)?;
        Ok(self.solidifiers.len() - 1)
    }

    pub fn add_damped_transform(&mut self, damped: DampedTransform) -> IkResult<usize> {
        let graph = self.graph_ref()?;
        let constraint = ConstraintRef::DampedTransform(self.damped.len());
        rejected(constraint, damped.validate(graph))?;
        self.damped.push(Slot::new(damped));
        self.commit(constraint)?;
        Ok(self.damped.len() - 1)
    }

    /// Re-attaches modifiers with the newest constraint included. Any
    /// conflict removes that constraint again.
    fn commit(&mut self, constraint: ConstraintRef) -> IkResult<()> {
        let Some(failure) = self.attach_modifiers().into_iter().next() else {
            return Ok(());
        };
        match constraint {
            ConstraintRef::LookAt(_) => drop(self.look_ats.pop()),
            ConstraintRef::Bind(_) => drop(self.loops.binds.pop()),
            ConstraintRef::ForkBind(_) => drop(self.loops.forks.pop()),
            ConstraintRef::CageBind(_) => drop(self.loops.cages.pop()),
            ConstraintRef::Solidifier(_) => drop(self.solidifiers.pop()),
            ConstraintRef::DampedTransform(_) => drop(self.damped.pop()),
            ConstraintRef::Chain(_) | ConstraintRef::Pole(_) => {}
        }
        self.attach_modifiers();
        rejected(constraint, Err(failure.error))
    }

    /// Clears and re-attaches every active modifier: loop constraints first,
    /// then solidifiers, damped transforms and look-ats, each in registration
    /// order.
    ///
    /// Loop constraints attach to the member the forward pass reaches last.
    /// Springs that stay attached to the same master keep their velocity.
    /// Returns the constraints whose attachment conflicted.
    fn attach_modifiers(&mut self) -> Vec<Diagnostic> {
        let Some(graph) = self.graph.as_mut() else {
            return Vec::new();
        };
        let springs = graph.spring_velocities();
        graph.wipe_modifiers();
        link_corrections(&mut self.loops.binds, graph);

        let mut failures = Vec::new();
        for (i, bind) in enumerate_active(&self.loops.binds) {
            if let Some(anchor) = anchor_of(graph, &bind.members()) {
                attach(graph, &mut failures, ConstraintRef::Bind(i), anchor, Attachment::Bind(i));
            }
        }
        for (i, fork) in enumerate_active(&self.loops.forks) {
            if let Some(anchor) = anchor_of(graph, &fork.members()) {
                attach(graph, &mut failures, ConstraintRef::ForkBind(i), anchor, Attachment::ForkBind(i));
            }
        }
        for (i, cage) in enumerate_active(&self.loops.cages) {
            if let Some(anchor) = anchor_of(graph, &cage.members()) {
                attach(graph, &mut failures, ConstraintRef::CageBind(i), anchor, Attachment::CageBind(i));
            }
        }
        for (i, solidifier) in enumerate_active(&self.solidifiers) {
            attach(graph, &mut failures, ConstraintRef::Solidifier(i), solidifier.root, Attachment::Solid);
        }
        for (i, damped) in enumerate_active(&self.damped) {
            let attachment = Attachment::DampedTransform(&damped.params);
            attach(graph, &mut failures, ConstraintRef::DampedTransform(i), damped.root, attachment);
        }
        for (i, look_at) in enumerate_active(&self.look_ats) {
            attach(graph, &mut failures, ConstraintRef::LookAt(i), look_at.bone, Attachment::LookAt);
        }
        graph.restore_spring_velocities(&springs);
        failures
    }

    fn deactivate(&mut self, constraint: ConstraintRef) {
        let active = match constraint {
            ConstraintRef::Chain(i) => self.chains.get_mut(i).map(|s| &mut s.active),
            ConstraintRef::Pole(i) => self.poles.get_mut(i).map(|s| &mut s.active),
            ConstraintRef::LookAt(i) => self.look_ats.get_mut(i).map(|s| &mut s.active),
            ConstraintRef::Bind(i) => self.loops.binds.get_mut(i).map(|s| &mut s.active),
            ConstraintRef::ForkBind(i) => self.loops.forks.get_mut(i).map(|s| &mut s.active),
            ConstraintRef::CageBind(i) => self.loops.cages.get_mut(i).map(|s| &mut s.active),
            ConstraintRef::Solidifier(i) => self.solidifiers.get_mut(i).map(|s| &mut s.active),
            ConstraintRef::DampedTransform(i) => self.damped.get_mut(i).map(|s| &mut s.active),
        };
        if let Some(active) = active {
            *active = false;
        }
    }

    pub fn set_chain_target<T: TargetProvider + 'static>(&mut self, handle: ChainHandle, target: T) -> IkResult<()> {
        let slot = self
            .chains
            .get_mut(handle.0)
            .ok_or(ConfigError::UnknownConstraint(ConstraintRef::Chain(handle.0)))?;
        slot.item.set_boxed_target(Box::new(target));
        Ok(())
    }

    pub fn set_pole_target<T: TargetProvider + 'static>(&mut self, handle: PoleHandle, target: T) -> IkResult<()> {
        let slot = self
            .poles
            .get_mut(handle.0)
            .ok_or(ConfigError::UnknownConstraint(ConstraintRef::Pole(handle.0)))?;
        slot.item.set_boxed_target(Box::new(target));
        Ok(())
    }

    pub fn set_look_at_target<T: TargetProvider + 'static>(
        &mut self,
        handle: LookAtHandle,
        target: T,
    ) -> IkResult<()> {
        let slot = self
            .look_ats
            .get_mut(handle.0)
            .ok_or(ConfigError::UnknownConstraint(ConstraintRef::LookAt(handle.0)))?;
        slot.item.set_boxed_target(Box::new(target));
        Ok(())
    }

    /// Pins a root bone to `position` from the next tick on.
    pub fn set_root_anchor(&mut self, bone: BoneId, position: Vec3) -> IkResult<()> {
        let graph = self.graph_ref()?;
        graph.check(bone)?;
        if !graph[bone].is_root() {
            return Err(ConfigError::InvalidParameter(format!("bone {bone} is not a root")).into());
        }
        if !position.is_finite() {
            return Err(ConfigError::InvalidParameter(format!("root anchor {position} is not finite")).into());
        }
        self.anchors.insert(bone, position);
        Ok(())
    }

    pub fn set_length_multiplier(&mut self, bone: BoneId, multiplier: f32) -> IkResult<()> {
        let graph = self.graph_mut()?;
        graph.check(bone)?;
        graph.set_length_multiplier(bone, multiplier);
        Ok(())
    }

    /// Solves one tick: chain iterations, then poles, then look-ats, then a
    /// final forward pass.
    pub fn tick(&mut self) -> IkResult<SolveResult> {
        if !self.enabled {
            return Ok(SolveResult::skipped());
        }
        let graph = self.graph.as_mut().ok_or(IkError::Resource(ResourceError::NoSkeleton))?;
        graph.begin_tick();

        let chains: Vec<(&Chain, TargetPose)> = active(&self.chains)
            .filter_map(|chain| sampled(chain.target.as_ref()).map(|target| (chain, target)))
            .collect();
        let pass = PassContext {
            anchors: &self.anchors,
            loops: &self.loops,
            integrate: true,
        };

        let result = FabrikSolver::solve(graph, &chains, &pass, &self.config);
        for pole in active(&self.poles) {
            if let Some(target) = sampled(pole.target.as_ref()) {
                pole.solve(graph, target.position);
            }
        }
        for look_at in active(&self.look_ats) {
            if let Some(target) = sampled(look_at.target.as_ref()) {
                look_at.solve(graph, target.position);
            }
        }
        FabrikSolver::total_pass(graph, &pass);

        log::trace!(
            "tick: {} iterations, error {:.6}, converged {}",
            result.iterations,
            result.total_error,
            result.converged
        );
        Ok(result)
    }

    /// One forward pass without spring integration.
    pub fn stabilize(&mut self) -> IkResult<()> {
        let graph = self.graph.as_mut().ok_or(IkError::Resource(ResourceError::NoSkeleton))?;
        let pass = PassContext {
            anchors: &self.anchors,
            loops: &self.loops,
            integrate: false,
        };
        FabrikSolver::total_pass(graph, &pass);
        Ok(())
    }

    pub fn reset_to_rest(&mut self) -> IkResult<()> {
        self.graph_mut()?.reset_to_rest();
        Ok(())
    }

    /// Writes the solved local pose of every bone to `host`.
    pub fn bake<H: HostSkeleton + ?Sized>(&self, host: &mut H) -> IkResult<()> {
        let graph = self.graph_ref()?;
        if host.bone_count() != graph.len() {
            return Err(ResourceError::SkeletonMismatch {
                expected: graph.len(),
                found: host.bone_count(),
            }
            .into());
        }
        for (index, pose) in graph.local_poses().into_iter().enumerate() {
            host.apply_local_pose(index, pose);
        }
        Ok(())
    }
}

fn active<T>(slots: &[Slot<T>]) -> impl Iterator<Item = &T> {
    slots.iter().filter(|slot| slot.active).map(|slot| &slot.item)
}

fn enumerate_active<T>(slots: &[Slot<T>]) -> impl Iterator<Item = (usize, &T)> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.active)
        .map(|(i, slot)| (i, &slot.item))
}

fn attach(
    graph: &mut BoneGraph,
    failures: &mut Vec<Diagnostic>,
    constraint: ConstraintRef,
    bone: BoneId,
    attachment: Attachment<'_>,
) {
    if let Err(error) = graph.set_modifier(bone, attachment) {
        failures.push(Diagnostic { constraint, error });
    }
}

/// Samples a target, skipping it for this tick when it is not finite.
fn sampled(provider: &dyn TargetProvider) -> Option<TargetPose> {
    let target = provider.sample();
    if target.is_finite() {
        Some(target)
    } else {
        log::warn!("ignoring non-finite target {target:?}");
        None
    }
}

fn rejected(constraint: ConstraintRef, result: Result<(), ConfigError>) -> IkResult<()> {
    result.map_err(|err| {
        log::warn!("{constraint} rejected: {err}");
        IkError::Configuration(err)
    })
}

fn revalidate<T>(
    slots: &mut [Slot<T>],
    failures: &mut Vec<Diagnostic>,
    kind: fn(usize) -> ConstraintRef,
    mut resolve: impl FnMut(&mut T) -> Result<(), ConfigError>,
) {
    for (i, slot) in slots.iter_mut().enumerate() {
        match resolve(&mut slot.item) {
            Ok(()) => slot.active = true,
            Err(error) => {
                slot.active = false;
                failures.push(Diagnostic {
                    constraint: kind(i),
                    error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::DampedTransformParams;
    use crate::ik::Side;
    use crate::skeleton::{ModifierKind, Skeleton};

    fn skeleton() -> Skeleton {
        let mut skeleton = Skeleton::new();
        let root = skeleton.add_offset("root", None, Vec3::ZERO);
        let spine = skeleton.add_offset("spine", Some(root), Vec3::Y);
        let head = skeleton.add_offset("head", Some(spine), Vec3::Y);
        skeleton.add_offset("tail", Some(root), Vec3::new(0.0, -1.0, 0.0));
        skeleton.add_offset("hat", Some(head), Vec3::Y);
        skeleton
    }

    fn rig() -> IkRig {
        let mut rig = IkRig::default();
        rig.set_skeleton(&skeleton()).unwrap();
        rig
    }

    #[test]
    fn tick_without_skeleton_fails_closed() {
        let mut rig = IkRig::default();
        assert_eq!(rig.tick(), Err(IkError::Resource(ResourceError::NoSkeleton)));
        assert_eq!(
            rig.add_chain(Chain::builder(BoneId::new(1), BoneId::new(0)).build()).unwrap_err(),
            IkError::Resource(ResourceError::NoSkeleton)
        );
        assert!(rig.set_skeleton(&Skeleton::new()).is_err());
        assert!(rig.graph().is_none());
    }

    #[test]
    fn disabled_rig_skips_the_tick() {
        let mut rig = rig();
        rig.set_enabled(false);
        assert!(rig.tick().unwrap().skipped);
    }

    #[test]
    fn invalid_config_keeps_the_previous_one() {
        let mut rig = rig();
        let bad = SolverConfig::default().with_minimal_distance(f32::NAN);
        assert!(rig.set_config(bad).is_err());
        assert_eq!(rig.config(), &SolverConfig::default());
    }

    #[test]
    fn conflicting_modifier_is_dropped_and_others_survive() {
        let mut rig = rig();
        let spine = rig.find_bone("spine").unwrap();
        let head = rig.find_bone("head").unwrap();
        rig.add_solidifier(Solidifier::new(spine)).unwrap();

        let err = rig.add_look_at(LookAt::new(head, Side::Up, Vec3::X)).unwrap_err();
        assert_eq!(
            err,
            IkError::Configuration(ConfigError::ModifierConflict { bone: head, existing: ModifierKind::Solid })
        );
        let graph = rig.graph().unwrap();
        assert_eq!(graph[head].modifier().kind(), ModifierKind::Solid);
        assert!(!graph.is_look_at_pivot(spine));
    }

    #[test]
    fn reassignment_deactivates_constraints_that_no_longer_fit() {
        let mut rig = rig();
        let hat = rig.find_bone("hat").unwrap();
        let root = rig.find_bone("root").unwrap();
        rig.add_chain(Chain::builder(hat, root).target(Vec3::new(1.0, 2.0, 0.0)).build()).unwrap();
        rig.add_solidifier(Solidifier::new(BoneId::new(2))).unwrap();

        let mut smaller = Skeleton::new();
        let r = smaller.add_offset("root", None, Vec3::ZERO);
        let a = smaller.add_offset("a", Some(r), Vec3::Y);
        smaller.add_offset("b", Some(a), Vec3::Y);
        rig.set_skeleton(&smaller).unwrap();

        let failed: Vec<ConstraintRef> = rig.diagnostics().iter().map(|d| d.constraint).collect();
        assert_eq!(failed, vec![ConstraintRef::Chain(0), ConstraintRef::Solidifier(0)]);
        assert!(rig.tick().is_ok());
    }

    #[test]
    fn root_anchor_pins_the_root() {
        let mut rig = rig();
        let root = rig.find_bone("root").unwrap();
        let hat = rig.find_bone("hat").unwrap();
        assert!(rig.set_root_anchor(hat, Vec3::ONE).is_err());
        rig.set_root_anchor(root, Vec3::new(0.0, 0.0, 3.0)).unwrap();
        rig.tick().unwrap();
        let graph = rig.graph().unwrap();
        assert_eq!(graph.position(root), Vec3::new(0.0, 0.0, 3.0));
        for bone in graph.bones().iter().filter(|bone| !bone.is_root()) {
            let parent = graph.position(bone.parent().unwrap());
            assert!((bone.position().distance(parent) - bone.length()).abs() < 1e-4);
        }
    }

    #[test]
    fn spring_velocity_survives_unrelated_registrations() {
        let mut skeleton = Skeleton::new();
        let tail = skeleton.add_offset("tail", None, Vec3::ZERO);
        skeleton.add_offset("tip", Some(tail), Vec3::X);
        let post = skeleton.add_offset("post", None, Vec3::new(3.0, 0.0, 0.0));
        skeleton.add_offset("flag", Some(post), Vec3::Y);
        let mut rig = IkRig::default();
        rig.set_skeleton(&skeleton).unwrap();
        let (tail, tip, post) = (BoneId::new(tail), BoneId::new(1), BoneId::new(post));
        rig.add_damped_transform(DampedTransform::new(tail, DampedTransformParams::default().with_gravity(0.05)))
            .unwrap();

        for _ in 0..3 {
            rig.tick().unwrap();
        }
        let velocity = rig.graph().unwrap()[tip].spring().unwrap().velocity;
        assert!(velocity.length() > 1e-3);

        rig.add_solidifier(Solidifier::new(post)).unwrap();
        assert_eq!(rig.graph().unwrap()[tip].spring().unwrap().velocity, velocity);
    }

    #[test]
    fn second_look_at_on_a_shared_pivot_is_rejected() {
        let mut skeleton = Skeleton::new();
        let face = skeleton.add_offset("face", None, Vec3::ZERO);
        skeleton.add_offset("left_eye", Some(face), Vec3::Y);
        skeleton.add_offset("right_eye", Some(face), Vec3::new(0.5, 1.0, 0.0));
        let mut rig = IkRig::default();
        rig.set_skeleton(&skeleton).unwrap();
        let [face, left, right] = [face, 1, 2].map(BoneId::new);

        rig.add_look_at(LookAt::new(left, Side::Up, Vec3::new(3.0, 0.0, 0.0))).unwrap();
        let err = rig.add_look_at(LookAt::new(right, Side::Up, Vec3::new(0.0, 0.0, 3.0))).unwrap_err();
        assert_eq!(
            err,
            IkError::Configuration(ConfigError::ModifierConflict { bone: face, existing: ModifierKind::LookAt })
        );

        rig.tick().unwrap();
        assert!(rig.graph().unwrap().position(left).abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn bake_rejects_mismatched_hosts() {
        let rig = rig();
        let mut other = Skeleton::new();
        other.add_offset("only", None, Vec3::ZERO);
        assert_eq!(
            rig.bake(&mut other),
            Err(IkError::Resource(ResourceError::SkeletonMismatch { expected: 5, found: 1 }))
        );
        let mut host = skeleton();
        rig.bake(&mut host).unwrap();
        assert!(host.pose(4).unwrap().position.abs_diff_eq(Vec3::Y, 1e-6));
    }
}

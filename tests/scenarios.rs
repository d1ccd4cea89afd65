//! End-to-end solver scenarios driven through the public rig API.

use approx::assert_relative_eq;
use glam::Vec3;
use ik_rig::skeleton::ModifierKind;
use ik_rig::{
    Bind, BoneGraph, BoneId, CageBind, Chain, ConfigError, DampedTransform, DampedTransformParams, ForkBind,
    IkError, IkRig, LookAt, Pole, ResourceError, RestBone, SharedTarget, Side, Skeleton, Solidifier, SolverConfig,
    Transform,
};

fn bone(rig: &IkRig, name: &str) -> BoneId {
    rig.find_bone(name).unwrap()
}

/// shoulder -> elbow -> wrist, unit bones straight up.
fn arm() -> Skeleton {
    let mut skeleton = Skeleton::new();
    let shoulder = skeleton.add_offset("shoulder", None, Vec3::ZERO);
    let elbow = skeleton.add_offset("elbow", Some(shoulder), Vec3::Y);
    skeleton.add_offset("wrist", Some(elbow), Vec3::Y);
    skeleton
}

fn arm_rig(config: SolverConfig, target: Vec3) -> IkRig {
    let mut rig = IkRig::new(config);
    rig.set_skeleton(&arm()).unwrap();
    let chain = Chain::builder(bone(&rig, "wrist"), bone(&rig, "shoulder")).target(target).build();
    rig.add_chain(chain).unwrap();
    rig
}

/// A small creature: a spine with an arm, a looking head, a rigid backpack
/// and a spring tail.
fn creature() -> Skeleton {
    let mut skeleton = Skeleton::new();
    let root = skeleton.add_offset("root", None, Vec3::ZERO);
    let spine = skeleton.add_offset("spine", Some(root), Vec3::Y);
    let shoulder = skeleton.add_offset("shoulder", Some(spine), Vec3::new(0.5, 0.5, 0.0));
    let elbow = skeleton.add_offset("elbow", Some(shoulder), Vec3::X);
    skeleton.add_offset("wrist", Some(elbow), Vec3::X);
    let neck = skeleton.add_offset("neck", Some(spine), Vec3::new(0.0, 0.8, 0.0));
    let head = skeleton.add_offset("head", Some(neck), Vec3::new(0.0, 0.4, 0.0));
    let hat = skeleton.add_offset("hat", Some(head), Vec3::new(0.0, 0.3, 0.0));
    skeleton.add_offset("feather", Some(hat), Vec3::new(0.1, 0.2, 0.0));
    let pack = skeleton.add_offset("pack", Some(spine), Vec3::new(0.0, 0.3, 0.4));
    skeleton.add_offset("strap", Some(pack), Vec3::new(0.0, -0.3, 0.1));
    let mut tail = skeleton.add_offset("tail_0", Some(root), Vec3::new(0.0, -0.2, -0.3));
    for i in 1..4 {
        tail = skeleton.add_offset(format!("tail_{i}"), Some(tail), Vec3::new(0.0, 0.0, -0.3));
    }
    skeleton
}

fn assert_lengths_hold(graph: &BoneGraph) {
    for b in graph.bones() {
        let Some(parent) = b.parent() else { continue };
        let distance = b.position().distance(graph.position(parent));
        assert!(
            (distance - b.effective_length()).abs() < 1e-4,
            "{} is {distance} from its parent, expected {}",
            b.name(),
            b.effective_length()
        );
    }
}

#[test]
fn two_bone_chain_reaches_targets() {
    for target in [
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(1.2, 0.2, 0.0),
        Vec3::new(0.5, 1.2, 0.3),
        Vec3::new(1.5, 0.5, 0.5),
    ] {
        let mut rig = arm_rig(SolverConfig::default(), target);
        let result = rig.tick().unwrap();
        let graph = rig.graph().unwrap();
        let reached = graph.position(bone(&rig, "wrist"));
        assert!(reached.distance(target) < 0.01, "target {target}, reached {reached} ({result:?})");
        assert_lengths_hold(graph);
    }
}

#[test]
fn unreachable_target_extends_the_chain() {
    let target = Vec3::new(3.0, 0.5, 0.0);
    let mut rig = arm_rig(SolverConfig::default().with_max_iterations(10), target);
    let result = rig.tick().unwrap();
    assert!(!result.converged);
    assert_eq!(result.iterations, 10);

    let graph = rig.graph().unwrap();
    let wrist = graph.position(bone(&rig, "wrist"));
    assert_relative_eq!(wrist.length(), 2.0, epsilon = 1e-3);
    assert!(wrist.normalize().dot(target.normalize()) > 0.9999);
    assert_lengths_hold(graph);
}

#[test]
fn arm_bends_toward_pole() {
    let target = Vec3::new(1.0, 1.0, 0.0);
    let mut rig = arm_rig(SolverConfig::default().with_max_iterations(10), target);
    let (wrist, shoulder, elbow) = (bone(&rig, "wrist"), bone(&rig, "shoulder"), bone(&rig, "elbow"));
    rig.add_pole(Pole::new(wrist, shoulder, Side::Back, Vec3::Z)).unwrap();
    rig.tick().unwrap();

    let graph = rig.graph().unwrap();
    let e = graph.position(elbow);
    assert!(e.z > 0.5, "elbow should bend toward +Z, got {e}");
    assert!(graph.position(wrist).distance(target) < 0.01);
    assert_relative_eq!(e.distance(graph.position(shoulder)), 1.0, epsilon = 1e-4);
    assert_relative_eq!(e.distance(graph.position(wrist)), 1.0, epsilon = 1e-4);
}

#[test]
fn lengths_hold_with_every_modifier_active() {
    let mut rig = IkRig::default();
    rig.set_skeleton(&creature()).unwrap();
    let hand = SharedTarget::new(Transform::from_position(Vec3::new(1.5, 1.5, 0.5)));
    let gaze = SharedTarget::new(Transform::from_position(Vec3::new(2.0, 2.0, 1.0)));

    rig.add_chain(Chain::builder(bone(&rig, "wrist"), bone(&rig, "spine")).target(hand.clone()).build())
        .unwrap();
    rig.add_pole(Pole::new(bone(&rig, "wrist"), bone(&rig, "shoulder"), Side::Back, Vec3::new(1.0, 1.0, -2.0)))
        .unwrap();
    rig.add_look_at(LookAt::new(bone(&rig, "head"), Side::Front, gaze.clone())).unwrap();
    rig.add_solidifier(Solidifier::new(bone(&rig, "pack"))).unwrap();
    rig.add_damped_transform(DampedTransform::new(
        bone(&rig, "tail_0"),
        DampedTransformParams::default().with_gravity(0.02),
    ))
    .unwrap();
    rig.set_length_multiplier(bone(&rig, "elbow"), 1.25).unwrap();

    for frame in 0..60 {
        let t = frame as f32 * 0.1;
        hand.set_position(Vec3::new(1.5 * t.cos(), 1.5 + 0.5 * t.sin(), 0.8 * t.sin()));
        gaze.set_position(Vec3::new(2.0 * t.sin(), 2.0, 2.0 * t.cos()));
        rig.tick().unwrap();
        assert_lengths_hold(rig.graph().unwrap());
    }
}

#[test]
fn forward_pass_is_idempotent() {
    let mut rig = arm_rig(SolverConfig::default(), Vec3::new(1.0, 1.2, 0.3));
    let (wrist, shoulder) = (bone(&rig, "wrist"), bone(&rig, "shoulder"));
    rig.add_pole(Pole::new(wrist, shoulder, Side::Left, Vec3::new(-1.0, 0.0, 1.0))).unwrap();
    rig.tick().unwrap();

    rig.stabilize().unwrap();
    let first: Vec<_> = rig.graph().unwrap().bones().iter().map(|b| (b.position(), b.rotation())).collect();
    rig.stabilize().unwrap();
    for (b, (position, rotation)) in rig.graph().unwrap().bones().iter().zip(first) {
        assert!(b.position().abs_diff_eq(position, 1e-5), "{} moved", b.name());
        assert!(b.rotation().abs_diff_eq(rotation, 1e-5), "{} turned", b.name());
    }
}

#[test]
fn root_stays_on_its_anchor() {
    let mut rig = IkRig::default();
    rig.set_skeleton(&arm()).unwrap();
    let (wrist, shoulder) = (bone(&rig, "wrist"), bone(&rig, "shoulder"));
    rig.add_chain(Chain::builder(wrist, shoulder).target(Vec3::new(4.0, 4.0, 4.0)).build()).unwrap();
    rig.add_pole(Pole::new(wrist, shoulder, Side::Right, Vec3::new(5.0, 0.0, 0.0))).unwrap();

    let anchor = Vec3::new(0.5, -1.0, 2.0);
    rig.set_root_anchor(shoulder, anchor).unwrap();
    for _ in 0..5 {
        rig.tick().unwrap();
        assert_eq!(rig.graph().unwrap().position(shoulder), anchor);
    }
}

#[test]
fn bind_holds_its_triangle_through_a_tick() {
    let mut skeleton = Skeleton::new();
    let root = skeleton.add_offset("root", None, Vec3::ZERO);
    let b1 = skeleton.add_offset("b1", Some(root), Vec3::Y);
    let b2 = skeleton.add_offset("b2", Some(b1), Vec3::X);
    skeleton.add_offset("b3", Some(b2), Vec3::new(-0.5, 1.0, 0.0));

    let mut rig = IkRig::default();
    rig.set_skeleton(&skeleton).unwrap();
    let [root, b1, b2, b3] = ["root", "b1", "b2", "b3"].map(|name| bone(&rig, name));
    let mut bind = Bind::new([b1, b2, b3]).with_corrections([Some(root), None, None]);
    rig.add_bind(bind.clone()).unwrap();
    bind.resolve(rig.graph().unwrap()).unwrap();
    // The forward pass reaches b3 last, so the triangle is solved there.
    assert_eq!(rig.graph().unwrap()[b3].modifier().kind(), ModifierKind::Bind);

    rig.add_chain(Chain::builder(b3, b1).target(Vec3::new(0.8, 2.3, 0.2)).build()).unwrap();
    for _ in 0..5 {
        rig.tick().unwrap();
    }

    let graph = rig.graph().unwrap();
    let [d12, d23, d31] = bind.lengths();
    for (a, b, rest) in [(b1, b2, d12), (b2, b3, d23), (b3, b1, d31)] {
        let d = graph.position(a).distance(graph.position(b));
        assert!((d - rest).abs() / rest < 0.01, "edge {a}-{b}: {d} vs {rest}");
    }
    assert_relative_eq!(graph.position(b1).length(), 1.0, epsilon = 1e-3);
    assert_eq!(graph.position(root), Vec3::ZERO);
}

#[test]
fn fork_keeps_its_target_on_the_last_spoke() {
    let mut skeleton = Skeleton::new();
    let root = skeleton.add_offset("root", None, Vec3::ZERO);
    let a = skeleton.add_offset("a", Some(root), Vec3::new(-1.0, 1.0, 0.0));
    skeleton.add_offset("b", Some(root), Vec3::new(1.0, 1.0, 0.0));
    skeleton.add_offset("c", Some(root), Vec3::new(0.0, 1.0, 1.0));
    skeleton.add_offset("target", Some(a), Vec3::new(1.0, 1.0, 0.0));

    let mut rig = IkRig::default();
    rig.set_skeleton(&skeleton).unwrap();
    let [root, a, b, c, target] = ["root", "a", "b", "c", "target"].map(|name| bone(&rig, name));
    let mut fork = ForkBind::new([a, b, c], target);
    rig.add_fork_bind(fork.clone()).unwrap();
    fork.resolve(rig.graph().unwrap()).unwrap();
    assert_eq!(rig.graph().unwrap()[target].modifier().kind(), ModifierKind::ForkBind);

    rig.add_chain(Chain::builder(target, a).target(Vec3::new(0.5, 2.4, -0.4)).build()).unwrap();
    for _ in 0..3 {
        rig.tick().unwrap();
    }

    let graph = rig.graph().unwrap();
    let [_, _, to_c] = fork.lengths();
    assert_relative_eq!(graph.position(target).distance(graph.position(c)), to_c, epsilon = 1e-4);
    assert_ne!(graph.position(target), Vec3::new(0.0, 2.0, 0.0));
    assert_eq!(graph.position(root), Vec3::ZERO);
}

#[test]
fn cage_drags_the_far_corner_along() {
    let mut skeleton = Skeleton::new();
    let root = skeleton.add_offset("root", None, Vec3::ZERO);
    let b1 = skeleton.add_offset("backbone_1", Some(root), Vec3::Y);
    let b2 = skeleton.add_offset("backbone_2", Some(b1), Vec3::X);
    skeleton.add_offset("target_1", Some(b1), Vec3::Y);
    skeleton.add_offset("target_2", Some(b2), Vec3::Y);

    let mut rig = IkRig::default();
    rig.set_skeleton(&skeleton).unwrap();
    let vertices = ["backbone_1", "backbone_2", "target_1", "target_2"].map(|name| bone(&rig, name));
    let [b1, b2, t1, t2] = vertices;
    let mut cage = CageBind::new([b1, b2], [t1, t2]);
    rig.add_cage_bind(cage.clone()).unwrap();
    cage.resolve(rig.graph().unwrap()).unwrap();
    // target_2 is the last vertex the forward pass reaches.
    assert_eq!(rig.graph().unwrap()[t2].modifier().kind(), ModifierKind::CageBind);

    rig.add_chain(Chain::builder(t2, b1).target(Vec3::new(1.0, 1.9, 0.5)).build()).unwrap();
    for _ in 0..5 {
        rig.tick().unwrap();
    }

    let graph = rig.graph().unwrap();
    for (i, j) in [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)] {
        let d = graph.position(vertices[i]).distance(graph.position(vertices[j]));
        let rest = cage.edge(i, j);
        assert!((d - rest).abs() / rest < 0.05, "edge {i}-{j}: {d} vs {rest}");
    }
    // target_1 is not on the chain; only the cage can move it.
    assert!(graph.position(t1).distance(Vec3::new(0.0, 2.0, 0.0)) > 1e-3);
}

#[test]
fn spring_tail_settles_where_gravity_balances_stiffness() {
    let settle = |stiffness: f32| {
        let mut skeleton = Skeleton::new();
        let root = skeleton.add_offset("root", None, Vec3::ZERO);
        skeleton.add_offset("tip", Some(root), Vec3::X);
        let mut rig = IkRig::default();
        rig.set_skeleton(&skeleton).unwrap();
        let params = DampedTransformParams::default().with_stiffness(stiffness).with_gravity(0.05);
        rig.add_damped_transform(DampedTransform::new(bone(&rig, "root"), params)).unwrap();
        for _ in 0..600 {
            rig.tick().unwrap();
        }
        let graph = rig.graph().unwrap();
        (graph.position(bone(&rig, "tip")), graph[bone(&rig, "root")].rotation())
    };

    // At rest the tail's angle below horizontal satisfies tan = gravity / stiffness.
    let (soft, root_rotation) = settle(0.1);
    assert_relative_eq!(soft.x, 0.894_427, epsilon = 1e-2);
    assert_relative_eq!(soft.y, -0.447_214, epsilon = 1e-2);
    assert!(root_rotation.abs_diff_eq(glam::Quat::IDENTITY, 1e-6));

    let (stiff, _) = settle(0.4);
    assert_relative_eq!(stiff.y, -0.124_035, epsilon = 1e-2);
    assert!(stiff.y > soft.y);
}

#[test]
fn spring_tail_sags_and_resets() {
    let mut skeleton = Skeleton::new();
    let root = skeleton.add_offset("root", None, Vec3::ZERO);
    skeleton.add_offset("tip", Some(root), Vec3::X);
    let mut rig = IkRig::default();
    rig.set_skeleton(&skeleton).unwrap();
    let (root, tip) = (bone(&rig, "root"), bone(&rig, "tip"));
    rig.add_damped_transform(DampedTransform::new(root, DampedTransformParams::default().with_gravity(0.05)))
        .unwrap();

    for _ in 0..200 {
        rig.tick().unwrap();
    }
    let sagged = rig.graph().unwrap().position(tip);
    assert!(sagged.y < -0.3, "tail should sag, got {sagged}");

    rig.reset_to_rest().unwrap();
    let graph = rig.graph().unwrap();
    assert_eq!(graph.position(tip), Vec3::X);
    assert_eq!(graph[tip].spring().unwrap().velocity, Vec3::ZERO);
}

#[test]
fn broken_skeleton_fails_closed() {
    let mut rig = IkRig::default();
    assert_eq!(rig.tick(), Err(IkError::Resource(ResourceError::NoSkeleton)));

    rig.set_skeleton(&arm()).unwrap();
    let mut host = Skeleton::new();
    host.add_bone("a", Some(1), Transform::IDENTITY);
    host.add_bone("b", Some(0), Transform::IDENTITY);
    assert_eq!(
        rig.set_skeleton(&host),
        Err(IkError::Resource(ResourceError::CyclicHierarchy))
    );
    assert_eq!(rig.tick(), Err(IkError::Resource(ResourceError::NoSkeleton)));
    assert!(rig.bake(&mut host).is_err());
}

#[test]
fn bad_constraint_is_dropped_and_others_keep_solving() {
    let target = Vec3::new(1.0, 1.0, 0.0);
    let mut rig = arm_rig(SolverConfig::default(), target);
    let (wrist, elbow) = (bone(&rig, "wrist"), bone(&rig, "elbow"));

    let err = rig.add_pole(Pole::new(wrist, elbow, Side::Back, Vec3::Z)).unwrap_err();
    assert_eq!(
        err,
        IkError::Configuration(ConfigError::PoleChainTooShort { tip: wrist, root: elbow, len: 2 })
    );
    assert!(rig.add_solidifier(Solidifier::new(wrist)).is_err());
    assert!(rig.add_chain(Chain::builder(BoneId::new(42), elbow).build()).is_err());

    rig.tick().unwrap();
    assert!(rig.graph().unwrap().position(wrist).distance(target) < 0.01);
    assert!(rig.diagnostics().is_empty());
}

#[test]
fn non_finite_targets_are_skipped_for_the_tick() {
    let target = SharedTarget::new(Transform::from_position(Vec3::new(1.0, 1.0, 0.0)));
    let mut rig = IkRig::new(SolverConfig::default().with_max_iterations(20));
    rig.set_skeleton(&arm()).unwrap();
    let handle = rig
        .add_chain(Chain::builder(bone(&rig, "wrist"), bone(&rig, "shoulder")).target(target.clone()).build())
        .unwrap();
    rig.tick().unwrap();

    target.set_position(Vec3::new(f32::NAN, 0.0, 0.0));
    rig.tick().unwrap();
    let graph = rig.graph().unwrap();
    assert!(graph.bones().iter().all(|b| b.position().is_finite()));
    assert_lengths_hold(graph);

    rig.set_chain_target(handle, Vec3::new(0.0, 1.0, 1.0)).unwrap();
    rig.tick().unwrap();
    assert!(rig.graph().unwrap().position(bone(&rig, "wrist")).distance(Vec3::new(0.0, 1.0, 1.0)) < 0.01);
}

#[test]
fn baked_pose_round_trips_through_the_host() {
    let target = Vec3::new(1.0, 1.0, 0.0);
    let mut rig = arm_rig(SolverConfig::default(), target);
    rig.tick().unwrap();

    let mut host = arm();
    rig.bake(&mut host).unwrap();
    let solved: Vec<RestBone> = host
        .bones()
        .iter()
        .enumerate()
        .map(|(i, b)| RestBone::new(b.name.clone(), b.parent, host.pose(i).unwrap()))
        .collect();
    let rebuilt = BoneGraph::from_rest_bones(&solved).unwrap();
    let wrist = rebuilt.find("wrist").unwrap();
    assert!(rebuilt.position(wrist).abs_diff_eq(rig.graph().unwrap().position(wrist), 1e-4));
}

use glam::{Quat, Vec3};
use ik_rig::{
    Chain, DampedTransform, DampedTransformParams, IkResult, IkRig, Pole, SharedTarget, Side, Skeleton,
    SolverConfig, SpringPreset, Transform,
};

const FRAMES: u32 = 300;

struct Demo {
    rig: IkRig,
    skeleton: Skeleton,
    hand_target: SharedTarget,
    time: f32,
}

impl Demo {
    fn new() -> IkResult<Self> {
        let mut skeleton = Skeleton::new();
        let pelvis = skeleton.add_offset("pelvis", None, Vec3::ZERO);
        let shoulder = skeleton.add_offset("shoulder", Some(pelvis), Vec3::new(0.0, 1.0, 0.0));
        let elbow = skeleton.add_offset("elbow", Some(shoulder), Vec3::new(0.0, 1.0, 0.0));
        skeleton.add_offset("wrist", Some(elbow), Vec3::new(0.0, 1.0, 0.0));
        let tail_base = skeleton.add_offset("tail_base", Some(pelvis), Vec3::new(0.0, 0.0, 0.3));
        let mut previous = tail_base;
        for i in 1..=4 {
            previous = skeleton.add_offset(format!("tail_{i}"), Some(previous), Vec3::new(0.0, 0.0, 0.3));
        }

        let mut rig = IkRig::new(SolverConfig::default().with_max_iterations(10));
        rig.set_skeleton(&skeleton)?;
        let bone = |name: &str| rig.find_bone(name).ok_or_else(|| ik_rig::ConfigError::UnknownBoneName(name.into()));
        let (wrist, shoulder, tail_base) = (bone("wrist")?, bone("shoulder")?, bone("tail_base")?);

        let hand_target = SharedTarget::new(Transform::from_position(Vec3::new(1.0, 2.0, 0.0)));
        rig.add_chain(Chain::builder(wrist, shoulder).target(hand_target.clone()).build())?;
        rig.add_pole(Pole::new(wrist, shoulder, Side::Back, Vec3::new(0.0, 1.5, 2.0)))?;
        rig.add_damped_transform(DampedTransform::new(
            tail_base,
            DampedTransformParams::from_preset(SpringPreset::Tail).with_gravity(0.01),
        ))?;

        Ok(Self {
            rig,
            skeleton,
            hand_target,
            time: 0.0,
        })
    }

    fn update(&mut self, dt: f32) -> IkResult<()> {
        self.time += dt;
        let orbit = Quat::from_rotation_y(self.time * 0.8);
        let reach = orbit * Vec3::new(1.2, 0.0, 0.4) + Vec3::new(0.0, 1.8 + 0.3 * (self.time * 1.7).sin(), 0.0);
        self.hand_target.set_position(reach);
        self.rig.set_root_anchor(ik_rig::BoneId::new(0), Vec3::new(0.2 * self.time.sin(), 0.0, 0.0))?;

        let result = self.rig.tick()?;
        self.rig.bake(&mut self.skeleton)?;
        log::debug!(
            "t={:.2} iterations={} error={:.5} converged={}",
            self.time,
            result.iterations,
            result.total_error,
            result.converged
        );
        Ok(())
    }
}

fn main() -> IkResult<()> {
    env_logger::init();

    let mut demo = Demo::new()?;
    for frame in 0..FRAMES {
        demo.update(1.0 / 60.0)?;
        if frame % 60 == 0 {
            if let Some(graph) = demo.rig.graph() {
                let wrist = graph.find("wrist").map(|id| graph.position(id));
                let tail = graph.find("tail_4").map(|id| graph.position(id));
                log::info!("frame {frame}: wrist {wrist:?}, tail tip {tail:?}");
            }
        }
    }
    log::info!("rejected writes: {}", demo.rig.graph().map_or(0, |g| g.rejected_writes()));
    Ok(())
}

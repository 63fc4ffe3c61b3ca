//! Fixtures shared by the unit tests.

use std::path::Path;

use nalgebra::{UnitQuaternion, Vector3};

use crate::engine::{
    BodyId, JointIndex, JointKind, JointRecord, JointState, LinkIndex, PhysicsEngine, BASE_LINK,
};
use crate::{Error, Pose, Result, RobotDescriptor};

pub(crate) const ARM_URDF: &str = include_str!("../tests/data/two_finger_arm.urdf");

/// Descriptor matching `ARM_URDF`.
pub(crate) fn arm_descriptor() -> RobotDescriptor {
    RobotDescriptor {
        name: "two_finger_arm".into(),
        urdf_path: "tests/data/two_finger_arm.urdf".into(),
        end_effector_joint: "tool_joint".into(),
        tool_link: "tool_link".into(),
        left_finger_joint: "left_finger_joint".into(),
        right_finger_joint: "right_finger_joint".into(),
        open_fingers: 0.04,
        closed_fingers: 0.0,
        home_joint_positions: vec![0., 0.3, -0.4, 0., 0., 0.04, 0.04],
        ikfast: None,
    }
}

/// Scripted engine with one body whose links report `x = sum of joint
/// positions from the base`, identity orientation.
#[derive(Debug, Clone)]
pub(crate) struct FakeEngine {
    pub joints: Vec<JointRecord>,
    pub states: Vec<JointState>,
    pub motor_commands: Vec<(Vec<JointIndex>, Vec<f64>)>,
    pub resets: usize,
}

pub(crate) const FAKE_BODY: BodyId = BodyId(0);

impl FakeEngine {
    pub fn new(layout: &[(&str, JointKind, LinkIndex)]) -> Self {
        let joints: Vec<_> = layout
            .iter()
            .enumerate()
            .map(|(index, (name, kind, parent_link))| {
                let (lower_limit, upper_limit) = match kind {
                    JointKind::Revolute => (-3., 3.),
                    JointKind::Prismatic => (0., 0.04),
                    _ => (0., 0.),
                };
                JointRecord {
                    index,
                    name: name.to_string(),
                    kind: *kind,
                    lower_limit,
                    upper_limit,
                    parent_link: *parent_link,
                    link_name: format!("{name}_link"),
                }
            })
            .collect();
        Self {
            states: vec![JointState::default(); joints.len()],
            joints,
            motor_commands: Vec::new(),
            resets: 0,
        }
    }

    /// Arm path 2 -> 4 -> 6 -> 9 -> 10 with fingers 11 and 12 on link 10.
    pub fn scenario() -> Self {
        use JointKind::*;
        use LinkIndex::Child;
        Self::new(&[
            ("aux0", Fixed, BASE_LINK),
            ("aux1", Revolute, Child(0)),
            ("shoulder", Revolute, BASE_LINK),
            ("aux3", Fixed, Child(2)),
            ("upper_arm", Revolute, Child(2)),
            ("aux5", Revolute, Child(4)),
            ("elbow", Revolute, Child(4)),
            ("aux7", Fixed, BASE_LINK),
            ("aux8", Revolute, Child(7)),
            ("wrist", Revolute, Child(6)),
            ("tool", Revolute, Child(9)),
            ("left_finger", Prismatic, Child(10)),
            ("right_finger", Prismatic, Child(10)),
        ])
    }

    pub fn scenario_descriptor() -> RobotDescriptor {
        RobotDescriptor {
            name: "scripted".into(),
            urdf_path: "scripted.urdf".into(),
            end_effector_joint: "tool".into(),
            tool_link: "tool_link".into(),
            left_finger_joint: "left_finger".into(),
            right_finger_joint: "right_finger".into(),
            open_fingers: 0.04,
            closed_fingers: 0.01,
            home_joint_positions: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.04, 0.04],
            ikfast: None,
        }
    }

    pub fn positions(&self) -> Vec<f64> {
        self.states.iter().map(|state| state.position).collect()
    }

    fn check(&self, body: BodyId, joint: JointIndex) -> Result<()> {
        if body != FAKE_BODY {
            return Err(Error::UnknownBody(body));
        }
        if joint >= self.joints.len() {
            return Err(Error::UnknownJoint { body, joint });
        }
        Ok(())
    }
}

impl PhysicsEngine for FakeEngine {
    fn load_robot(&mut self, _urdf_path: &Path, _base_pose: &Pose) -> Result<BodyId> {
        Ok(FAKE_BODY)
    }

    fn base_link_name(&self, _body: BodyId) -> Result<String> {
        Ok("base".into())
    }

    fn num_joints(&self, _body: BodyId) -> Result<usize> {
        Ok(self.joints.len())
    }

    fn joint_info(&self, body: BodyId, joint: JointIndex) -> Result<JointRecord> {
        self.check(body, joint)?;
        Ok(self.joints[joint].clone())
    }

    fn joint_state(&self, body: BodyId, joint: JointIndex) -> Result<JointState> {
        self.check(body, joint)?;
        Ok(self.states[joint])
    }

    fn reset_joint_state(
        &mut self,
        body: BodyId,
        joint: JointIndex,
        position: f64,
        velocity: f64,
    ) -> Result<()> {
        self.check(body, joint)?;
        self.resets += 1;
        self.states[joint] = JointState { position, velocity };
        Ok(())
    }

    fn link_world_pose(&self, body: BodyId, link: LinkIndex) -> Result<Pose> {
        let mut x = 0.;
        let mut current = link;
        let mut hops = 0;
        while let LinkIndex::Child(joint) = current {
            self.check(body, joint)?;
            hops += 1;
            if hops > self.joints.len() {
                return Err(Error::InvalidDescription("cyclic joint graph".into()));
            }
            x += self.states[joint].position;
            current = self.joints[joint].parent_link;
        }
        Ok(Pose::new(Vector3::new(x, 0., 0.), UnitQuaternion::identity()))
    }

    fn set_joint_motor_targets(
        &mut self,
        body: BodyId,
        joints: &[JointIndex],
        targets: &[f64],
    ) -> Result<()> {
        for joint in joints {
            self.check(body, *joint)?;
        }
        self.motor_commands.push((joints.to_vec(), targets.to_vec()));
        Ok(())
    }
}

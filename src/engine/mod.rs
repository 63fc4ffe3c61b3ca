//! The narrow interface the core drives a physics/kinematics engine through.
//!
//! An engine value is the session handle: every call against a loaded body
//! goes through it, so whoever holds the engine serializes access to its
//! bodies.

mod kinematic;

use std::path::Path;

use crate::{Pose, Result};

pub use kinematic::KinematicEngine;

/// Joint index, stable within a body. Link `i` is the child link of joint `i`.
pub type JointIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkIndex {
    /// The fixed base link, owned by no joint.
    Base,
    Child(JointIndex),
}

pub const BASE_LINK: LinkIndex = LinkIndex::Base;

impl LinkIndex {
    pub fn joint(self) -> Option<JointIndex> {
        match self {
            LinkIndex::Base => None,
            LinkIndex::Child(index) => Some(index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    Revolute,
    Prismatic,
    Fixed,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointRecord {
    pub index: JointIndex,
    pub name: String,
    pub kind: JointKind,
    pub lower_limit: f64,
    pub upper_limit: f64,
    pub parent_link: LinkIndex,
    /// Name of the child link this joint owns.
    pub link_name: String,
}

impl JointRecord {
    pub fn is_movable(&self) -> bool {
        matches!(self.kind, JointKind::Revolute | JointKind::Prismatic)
    }

    /// Clamp `value` into the joint limits, leaving it untouched when the
    /// limits are inverted (unbounded or unspecified).
    pub fn clamp(&self, value: f64) -> f64 {
        if self.lower_limit <= self.upper_limit {
            value.clamp(self.lower_limit, self.upper_limit)
        } else {
            value
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointState {
    pub position: f64,
    pub velocity: f64,
}

pub trait PhysicsEngine {
    /// Load a robot description with a fixed base at `base_pose`.
    fn load_robot(&mut self, urdf_path: &Path, base_pose: &Pose) -> Result<BodyId>;

    fn base_link_name(&self, body: BodyId) -> Result<String>;

    fn num_joints(&self, body: BodyId) -> Result<usize>;

    fn joint_info(&self, body: BodyId, joint: JointIndex) -> Result<JointRecord>;

    fn joint_state(&self, body: BodyId, joint: JointIndex) -> Result<JointState>;

    /// Teleport a joint, bypassing dynamics.
    fn reset_joint_state(
        &mut self,
        body: BodyId,
        joint: JointIndex,
        position: f64,
        velocity: f64,
    ) -> Result<()>;

    /// World-frame pose of a link.
    fn link_world_pose(&self, body: BodyId, link: LinkIndex) -> Result<Pose>;

    /// One batched position-control command over `joints`.
    fn set_joint_motor_targets(
        &mut self,
        body: BodyId,
        joints: &[JointIndex],
        targets: &[f64],
    ) -> Result<()>;
}

impl<E: PhysicsEngine + ?Sized> PhysicsEngine for &mut E {
    fn load_robot(&mut self, urdf_path: &Path, base_pose: &Pose) -> Result<BodyId> {
        (**self).load_robot(urdf_path, base_pose)
    }

    fn base_link_name(&self, body: BodyId) -> Result<String> {
        (**self).base_link_name(body)
    }

    fn num_joints(&self, body: BodyId) -> Result<usize> {
        (**self).num_joints(body)
    }

    fn joint_info(&self, body: BodyId, joint: JointIndex) -> Result<JointRecord> {
        (**self).joint_info(body, joint)
    }

    fn joint_state(&self, body: BodyId, joint: JointIndex) -> Result<JointState> {
        (**self).joint_state(body, joint)
    }

    fn reset_joint_state(
        &mut self,
        body: BodyId,
        joint: JointIndex,
        position: f64,
        velocity: f64,
    ) -> Result<()> {
        (**self).reset_joint_state(body, joint, position, velocity)
    }

    fn link_world_pose(&self, body: BodyId, link: LinkIndex) -> Result<Pose> {
        (**self).link_world_pose(body, link)
    }

    fn set_joint_motor_targets(
        &mut self,
        body: BodyId,
        joints: &[JointIndex],
        targets: &[f64],
    ) -> Result<()> {
        (**self).set_joint_motor_targets(body, joints, targets)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(kind: JointKind, lower: f64, upper: f64) -> JointRecord {
        JointRecord {
            index: 0,
            name: "j".into(),
            kind,
            lower_limit: lower,
            upper_limit: upper,
            parent_link: BASE_LINK,
            link_name: "l".into(),
        }
    }

    #[test]
    fn test_clamp() {
        let joint = record(JointKind::Revolute, -1., 1.);
        assert_eq!(joint.clamp(2.), 1.);
        assert_eq!(joint.clamp(-2.), -1.);
        assert_eq!(joint.clamp(0.5), 0.5);

        let unbounded = record(JointKind::Revolute, 0., -1.);
        assert_eq!(unbounded.clamp(7.), 7.);
    }

    #[test]
    fn test_link_index() {
        assert_eq!(BASE_LINK.joint(), None);
        assert_eq!(LinkIndex::Child(3).joint(), Some(3));
        assert!(!record(JointKind::Fixed, 0., 0.).is_movable());
    }
}

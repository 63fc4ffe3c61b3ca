use std::path::PathBuf;

use nalgebra::Vector3;

use crate::engine::{BodyId, JointIndex, LinkIndex};
use crate::pose::Pose;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to build kinematic chain: {0}")]
    ChainBuild(#[from] ChainBuildError),

    #[error("joint vector has {actual} entries, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unsupported control mode: {0}")]
    UnsupportedControlMode(String),

    #[error("no IK solution found for target pose {target}")]
    NoIkSolution { target: Pose },

    #[error("inverse kinematics failed: {0}")]
    InverseKinematics(#[from] IkFailure),

    #[error("robot declares analytic profile {0} but no analytic solver is registered")]
    MissingAnalyticSolver(String),

    #[error("unknown body {0:?}")]
    UnknownBody(BodyId),

    #[error("body {body:?} has no joint {joint}")]
    UnknownJoint { body: BodyId, joint: JointIndex },

    #[error("no joint named {0}")]
    UnknownJointName(String),

    #[error("no link named {0}")]
    UnknownLinkName(String),

    #[error("invalid robot description: {0}")]
    InvalidDescription(String),

    #[error("URDF error: {0}")]
    Urdf(#[from] urdf_rs::UrdfError),

    #[error("descriptor parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Reasons a joint graph cannot yield an arm chain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainBuildError {
    #[error("end effector joint {0} not found")]
    MissingEndEffector(String),

    #[error("joint {joint} hangs from link {parent:?}, which no joint owns")]
    Disconnected { joint: JointIndex, parent: LinkIndex },

    #[error("parent traversal from joint {0} revisits a joint")]
    Cycle(JointIndex),

    #[error("finger joint {0} not found")]
    MissingFinger(String),

    #[error("finger joint {0} lies on the arm path")]
    FingerInArm(JointIndex),

    #[error("left and right finger are the same joint {0}")]
    SameFinger(JointIndex),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IkFailure {
    /// Forward kinematics of the candidate lands away from the target.
    #[error("joint states do not match target position {target:?}, reached {reached:?}")]
    ValidationMismatch {
        target: Vector3<f64>,
        reached: Vector3<f64>,
    },

    #[error(
        "no convergence after {iterations} iterations \
         (position error {position_error:.6}, orientation error {orientation_error:.6})"
    )]
    NotConverged {
        iterations: usize,
        position_error: f64,
        orientation_error: f64,
    },
}

impl IkFailure {
    /// Reached minus target position, for validation mismatches.
    pub fn delta(&self) -> Option<Vector3<f64>> {
        match self {
            IkFailure::ValidationMismatch { target, reached } => Some(reached - target),
            IkFailure::NotConverged { .. } => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let e = Error::DimensionMismatch {
            expected: 7,
            actual: 5,
        };
        assert_eq!(e.to_string(), "joint vector has 5 entries, expected 7");

        let e = Error::from(ChainBuildError::MissingFinger("left".into()));
        assert_eq!(
            e.to_string(),
            "failed to build kinematic chain: finger joint left not found"
        );

        let e = Error::UnsupportedControlMode("torque".into());
        assert_eq!(e.to_string(), "unsupported control mode: torque");
    }

    #[test]
    fn test_delta() {
        let failure = IkFailure::ValidationMismatch {
            target: Vector3::new(1., 0., 0.),
            reached: Vector3::new(1.5, 0., -0.5),
        };
        assert_eq!(failure.delta(), Some(Vector3::new(0.5, 0., -0.5)));

        let failure = IkFailure::NotConverged {
            iterations: 10,
            position_error: 0.1,
            orientation_error: 0.2,
        };
        assert_eq!(failure.delta(), None);
    }
}

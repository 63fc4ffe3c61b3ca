//! Static per-robot-type description and per-instance configuration.

use std::{fmt, path::Path, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Pose, Result};

/// Closed-form solver profile. Its presence selects the analytic IK path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IkFastProfile {
    pub module_dir: String,
    pub module_name: String,
    pub base_link: String,
    pub ee_link: String,
    #[serde(default)]
    pub free_joints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotDescriptor {
    pub name: String,
    pub urdf_path: PathBuf,
    /// Joint whose child link is the IK target frame.
    pub end_effector_joint: String,
    pub tool_link: String,
    pub left_finger_joint: String,
    pub right_finger_joint: String,
    pub open_fingers: f64,
    pub closed_fingers: f64,
    /// Chain-ordered, fingers included.
    pub home_joint_positions: Vec<f64>,
    #[serde(default)]
    pub ikfast: Option<IkFastProfile>,
}

impl RobotDescriptor {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s)
    }

    /// Franka Emika Panda on a fixed base.
    ///
    /// The tool joint sits between the two fingertips rather than at the
    /// hand frame.
    pub fn panda() -> Self {
        Self {
            name: "panda".into(),
            urdf_path: "urdf/franka_description/robots/panda_arm_hand.urdf".into(),
            end_effector_joint: "tool_joint".into(),
            tool_link: "tool_link".into(),
            left_finger_joint: "panda_finger_joint1".into(),
            right_finger_joint: "panda_finger_joint2".into(),
            open_fingers: 0.04,
            closed_fingers: 0.03,
            home_joint_positions: vec![
                -1.6760817784086874,
                -0.8633617886115512,
                1.0820023618960484,
                -1.7862427129376002,
                0.7563762599673787,
                1.3595324116603988,
                1.7604148617061273,
                0.04,
                0.04,
            ],
            ikfast: Some(IkFastProfile {
                module_dir: "panda_arm".into(),
                module_name: "ikfast_panda_arm".into(),
                base_link: "panda_link0".into(),
                ee_link: "panda_link8".into(),
                free_joints: vec!["panda_joint7".into()],
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ControlMode {
    /// Batched position-control commands integrated by the engine.
    #[default]
    Position,
    /// Motor commands teleport the joints.
    Reset,
}

impl FromStr for ControlMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "position" => Ok(ControlMode::Position),
            "reset" => Ok(ControlMode::Reset),
            other => Err(Error::UnsupportedControlMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for ControlMode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ControlMode> for String {
    fn from(mode: ControlMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Position => f.write_str("position"),
            ControlMode::Reset => f.write_str("reset"),
        }
    }
}

/// Per-instance settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RobotConfig {
    pub base_pose: Pose,
    pub control_mode: ControlMode,
    /// Overrides the descriptor's home vector.
    pub home_joint_positions: Option<Vec<f64>>,
}

//! # gripper-arm: kinematic chains and inverse kinematics for single-arm robots
//! with a two-finger gripper, driven through an external physics engine.

// #![deny(missing_docs)]
#![deny(unsafe_code)]

mod chain;
mod descriptor;
pub mod engine;
mod error;
pub mod ik;
mod joint_graph;
mod pose;
mod robot;

#[cfg(test)]
mod testing;

pub use chain::ArmChain;
pub use descriptor::{ControlMode, IkFastProfile, RobotConfig, RobotDescriptor};
pub use error::{ChainBuildError, Error, IkFailure, Result};
pub use ik::{IkOptions, IkResolver};
pub use joint_graph::JointGraph;
pub use pose::Pose;
pub use robot::RobotModel;

//! Single-arm, two-finger manipulator bound to one body of an engine.

use approx::AbsDiffEq;
use tracing::{debug, info, warn};

use crate::chain::ArmChain;
use crate::descriptor::{ControlMode, IkFastProfile, RobotConfig, RobotDescriptor};
use crate::engine::{BodyId, JointIndex, JointRecord, LinkIndex, PhysicsEngine};
use crate::error::{ChainBuildError, IkFailure};
use crate::joint_graph::JointGraph;
use crate::{Pose, Result};

/// A fixed-base robot arm with a two-finger gripper.
///
/// The arm chain, name tables and joint limits are computed once at
/// construction; the body's joint topology does not change after load.
/// All joint-position vectors are chain-ordered, see [`ArmChain`].
#[derive(Debug)]
pub struct RobotModel<E: PhysicsEngine> {
    engine: E,
    body: BodyId,
    descriptor: RobotDescriptor,
    base_pose: Pose,
    control_mode: ControlMode,
    home_joint_positions: Vec<f64>,
    graph: JointGraph,
    chain: ArmChain,
    tool_link: LinkIndex,
    arm_joint_names: Vec<String>,
    joint_lower_limits: Vec<f64>,
    joint_upper_limits: Vec<f64>,
}

impl<E: PhysicsEngine> RobotModel<E> {
    /// Load the descriptor's URDF into `engine` and wrap the new body.
    pub fn new(mut engine: E, descriptor: RobotDescriptor, config: RobotConfig) -> Result<Self> {
        let body = engine.load_robot(&descriptor.urdf_path, &config.base_pose)?;
        Self::from_body(engine, body, descriptor, config)
    }

    /// Wrap a body already loaded in `engine` and move it to its home
    /// configuration.
    pub fn from_body(
        engine: E,
        body: BodyId,
        descriptor: RobotDescriptor,
        config: RobotConfig,
    ) -> Result<Self> {
        let graph = JointGraph::query(&engine, body)?;
        let resolve = |name: &str, missing: fn(String) -> ChainBuildError| {
            graph
                .joint_from_name(name)
                .map_err(|_| missing(name.to_string()))
        };
        let end_effector = resolve(
            &descriptor.end_effector_joint,
            ChainBuildError::MissingEndEffector,
        )?;
        let left_finger = resolve(&descriptor.left_finger_joint, ChainBuildError::MissingFinger)?;
        let right_finger = resolve(&descriptor.right_finger_joint, ChainBuildError::MissingFinger)?;
        let chain = ArmChain::build(&graph, end_effector, left_finger, right_finger)?;
        let tool_link = graph.link_from_name(&descriptor.tool_link)?;

        let records: Vec<&JointRecord> = chain
            .joints()
            .iter()
            .map(|index| &graph.joints()[*index])
            .collect();
        let arm_joint_names = records.iter().map(|joint| joint.name.clone()).collect();
        let joint_lower_limits = records.iter().map(|joint| joint.lower_limit).collect();
        let joint_upper_limits = records.iter().map(|joint| joint.upper_limit).collect();

        let home_joint_positions = config
            .home_joint_positions
            .unwrap_or_else(|| descriptor.home_joint_positions.clone());
        chain.check_len(&home_joint_positions)?;

        let mut robot = Self {
            engine,
            body,
            descriptor,
            base_pose: config.base_pose,
            control_mode: config.control_mode,
            home_joint_positions,
            graph,
            chain,
            tool_link,
            arm_joint_names,
            joint_lower_limits,
            joint_upper_limits,
        };
        let home = robot.home_joint_positions.clone();
        robot.set_joints(&home)?;
        info!(
            robot = %robot.descriptor.name,
            body = body.0,
            chain = ?robot.chain.joints(),
            "robot ready"
        );
        Ok(robot)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn body_id(&self) -> BodyId {
        self.body
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &RobotDescriptor {
        &self.descriptor
    }

    pub fn ikfast_profile(&self) -> Option<&IkFastProfile> {
        self.descriptor.ikfast.as_ref()
    }

    pub fn base_pose(&self) -> &Pose {
        &self.base_pose
    }

    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    pub fn home_joint_positions(&self) -> &[f64] {
        &self.home_joint_positions
    }

    pub fn chain(&self) -> &ArmChain {
        &self.chain
    }

    pub fn joint_graph(&self) -> &JointGraph {
        &self.graph
    }

    /// Joint indices of the arm chain, fingers last.
    pub fn arm_joints(&self) -> &[JointIndex] {
        self.chain.joints()
    }

    pub fn arm_joint_names(&self) -> &[String] {
        &self.arm_joint_names
    }

    /// Every joint of the body, a superset of the arm joints.
    pub fn joint_infos(&self) -> &[JointRecord] {
        self.graph.joints()
    }

    pub fn joint_names(&self) -> Vec<&str> {
        self.graph.joint_names().collect()
    }

    pub fn joint_from_name(&self, name: &str) -> Result<JointIndex> {
        self.graph.joint_from_name(name)
    }

    pub fn joint_info_from_name(&self, name: &str) -> Result<&JointRecord> {
        let index = self.graph.joint_from_name(name)?;
        Ok(&self.graph.joints()[index])
    }

    pub fn link_from_name(&self, name: &str) -> Result<LinkIndex> {
        self.graph.link_from_name(name)
    }

    pub fn base_link_name(&self) -> &str {
        self.graph.base_link_name()
    }

    pub fn end_effector_id(&self) -> JointIndex {
        self.chain.end_effector()
    }

    pub fn tool_link_id(&self) -> LinkIndex {
        self.tool_link
    }

    pub fn left_finger_id(&self) -> JointIndex {
        self.chain.left_finger()
    }

    pub fn right_finger_id(&self) -> JointIndex {
        self.chain.right_finger()
    }

    pub fn left_finger_joint_idx(&self) -> usize {
        self.chain.left_finger_slot()
    }

    pub fn right_finger_joint_idx(&self) -> usize {
        self.chain.right_finger_slot()
    }

    /// Lower bounds of the arm chain, chain-ordered.
    pub fn joint_lower_limits(&self) -> &[f64] {
        &self.joint_lower_limits
    }

    pub fn joint_upper_limits(&self) -> &[f64] {
        &self.joint_upper_limits
    }

    pub fn open_fingers(&self) -> f64 {
        self.descriptor.open_fingers
    }

    pub fn closed_fingers(&self) -> f64 {
        self.descriptor.closed_fingers
    }

    pub fn get_joints(&self) -> Result<Vec<f64>> {
        self.chain
            .joints()
            .iter()
            .map(|joint| Ok(self.engine.joint_state(self.body, *joint)?.position))
            .collect()
    }

    /// Teleport every chain joint to `joint_positions` with zero velocity.
    ///
    /// Only meant for configuration-space queries and initialization, never
    /// while a simulation loop is stepping dynamics.
    pub fn set_joints(&mut self, joint_positions: &[f64]) -> Result<()> {
        self.chain.check_len(joint_positions)?;
        for (joint, position) in self.chain.joints().iter().zip(joint_positions) {
            self.engine
                .reset_joint_state(self.body, *joint, *position, 0.)?;
        }
        Ok(())
    }

    /// Drive the motors toward `joint_positions` according to the control mode.
    pub fn set_motors(&mut self, joint_positions: &[f64]) -> Result<()> {
        self.chain.check_len(joint_positions)?;
        match self.control_mode {
            ControlMode::Position => {
                self.engine
                    .set_joint_motor_targets(self.body, self.chain.joints(), joint_positions)
            }
            ControlMode::Reset => self.set_joints(joint_positions),
        }
    }

    pub fn go_home(&mut self) -> Result<()> {
        let home = self.home_joint_positions.clone();
        self.set_motors(&home)
    }

    pub fn get_end_effector_pose(&self) -> Result<Pose> {
        self.engine
            .link_world_pose(self.body, LinkIndex::Child(self.chain.end_effector()))
    }

    /// End-effector pose for `joint_positions`.
    ///
    /// Leaves the robot at `joint_positions`; callers that need the previous
    /// state must save and restore it.
    pub fn forward_kinematics(&mut self, joint_positions: &[f64]) -> Result<Pose> {
        self.set_joints(joint_positions)?;
        self.get_end_effector_pose()
    }

    /// Left finger position. The right finger is assumed to mirror it.
    pub fn get_finger_state(&self) -> Result<f64> {
        Ok(self
            .engine
            .joint_state(self.body, self.chain.left_finger())?
            .position)
    }

    /// Check that `joint_positions` puts the end effector within `tolerance`
    /// of `target`'s position on every axis. Orientation is not compared.
    ///
    /// The joint state is restored before returning, on every path.
    pub fn validate_joint_positions(
        &mut self,
        joint_positions: &[f64],
        target: &Pose,
        tolerance: f64,
    ) -> Result<()> {
        self.chain.check_len(joint_positions)?;
        let saved = self.get_joints()?;
        let reached = self.forward_kinematics(joint_positions);
        let restored = self.set_joints(&saved);
        let reached = reached?.position;
        restored?;

        if !reached.abs_diff_eq(&target.position, tolerance) {
            warn!(target = ?target.position, ?reached, "joint positions miss the target");
            return Err(IkFailure::ValidationMismatch {
                target: target.position,
                reached,
            }
            .into());
        }
        debug!(?reached, "joint positions validated");
        Ok(())
    }
}

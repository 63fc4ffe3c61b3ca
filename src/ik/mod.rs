//! Inverse kinematics dispatch.
//!
//! Robots that declare an [`IkFastProfile`](crate::IkFastProfile) go through
//! a closed-form [`AnalyticIkSolver`]: its arm-only answer gets the open
//! finger value inserted and, on request, is checked by forward kinematics.
//! Everything else goes through a [`NumericIkSolver`] over the full chain.

mod analytic;
mod numeric;

use tracing::debug;

use crate::engine::PhysicsEngine;
use crate::{Error, Pose, Result, RobotModel};

pub use analytic::{AnalyticIkRequest, AnalyticIkSolver};
pub use numeric::{DampedLeastSquares, NumericIkRequest, NumericIkSolver};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkOptions {
    /// Guarantee the result reaches the target position.
    pub validate: bool,
    /// Leave the robot at the result. Recommended when chaining IK calls,
    /// since the analytic path seeds from the current state.
    pub apply_result: bool,
    /// Per-axis position tolerance for validation, meters.
    pub validation_tolerance: f64,
}

impl IkOptions {
    pub fn new(validate: bool, apply_result: bool) -> Self {
        Self {
            validate,
            apply_result,
            ..Default::default()
        }
    }
}

impl Default for IkOptions {
    fn default() -> Self {
        Self {
            validate: true,
            apply_result: true,
            validation_tolerance: 1e-3,
        }
    }
}

pub struct IkResolver<N = DampedLeastSquares> {
    analytic: Option<Box<dyn AnalyticIkSolver>>,
    numeric: N,
}

impl IkResolver {
    pub fn new() -> Self {
        Self::with_numeric(DampedLeastSquares::default())
    }
}

impl Default for IkResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NumericIkSolver> IkResolver<N> {
    pub fn with_numeric(numeric: N) -> Self {
        Self {
            analytic: None,
            numeric,
        }
    }

    /// Register the closed-form solver used for robots with an analytic profile.
    pub fn with_analytic(mut self, solver: impl AnalyticIkSolver + 'static) -> Self {
        self.analytic = Some(Box::new(solver));
        self
    }

    pub fn numeric(&self) -> &N {
        &self.numeric
    }

    /// Chain-ordered joint positions placing the end effector at `target`,
    /// seeded from the robot's current joint state.
    ///
    /// Joint state is only changed when `options.apply_result` is set and
    /// the call succeeds.
    pub fn inverse_kinematics<E: PhysicsEngine>(
        &self,
        robot: &mut RobotModel<E>,
        target: &Pose,
        options: IkOptions,
    ) -> Result<Vec<f64>> {
        let joint_positions = match robot.ikfast_profile().cloned() {
            Some(profile) => {
                let solver = self
                    .analytic
                    .as_deref()
                    .ok_or_else(|| Error::MissingAnalyticSolver(profile.module_name.clone()))?;
                debug!(module = %profile.module_name, %target, "analytic ik");
                let current = robot.get_joints()?;
                let seed = robot.chain().strip_fingers(&current)?;
                let solutions = solver.solve(&AnalyticIkRequest {
                    profile: &profile,
                    seed: &seed,
                    target,
                    world_from_base: robot.base_pose(),
                })?;
                // closest to the seed comes first
                let Some(best) = solutions.into_iter().next() else {
                    return Err(Error::NoIkSolution { target: *target });
                };
                let candidate = robot.chain().insert_fingers(&best, robot.open_fingers())?;
                if options.validate {
                    robot.validate_joint_positions(
                        &candidate,
                        target,
                        options.validation_tolerance,
                    )?;
                }
                candidate
            }
            None => {
                debug!(%target, "numeric ik");
                let joints = robot.arm_joints().to_vec();
                let request = NumericIkRequest {
                    body: robot.body_id(),
                    end_effector: robot.end_effector_id(),
                    target_position: target.position,
                    target_orientation: target.orientation,
                    joints: &joints,
                    validate: options.validate,
                };
                let candidate = self.numeric.solve(robot.engine_mut(), &request)?;
                robot.chain().check_len(&candidate)?;
                candidate
            }
        };

        if options.apply_result {
            robot.set_joints(&joint_positions)?;
        }
        Ok(joint_positions)
    }
}

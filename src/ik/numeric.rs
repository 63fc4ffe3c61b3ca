use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3, Vector6};
use tracing::{debug, trace, warn};

use crate::engine::{BodyId, JointIndex, JointRecord, JointState, LinkIndex, PhysicsEngine};
use crate::error::IkFailure;
use crate::{Pose, Result};

/// Input handed to a robot-agnostic iterative solver.
#[derive(Debug, Clone, Copy)]
pub struct NumericIkRequest<'a> {
    pub body: BodyId,
    /// Joint owning the end-effector link.
    pub end_effector: JointIndex,
    pub target_position: Vector3<f64>,
    pub target_orientation: UnitQuaternion<f64>,
    /// Full arm chain, fingers included. The result follows this order.
    pub joints: &'a [JointIndex],
    /// Fail instead of returning a best effort when the tolerance is missed.
    pub validate: bool,
}

/// Iterative IK over the whole chain.
///
/// Implementations keep results inside the joint limits reported by the
/// engine and leave the engine's joint state as they found it.
pub trait NumericIkSolver {
    fn solve<E: PhysicsEngine + ?Sized>(
        &self,
        engine: &mut E,
        request: &NumericIkRequest<'_>,
    ) -> Result<Vec<f64>>;
}

/// Damped least squares on a finite-difference Jacobian probed through the
/// engine.
#[derive(Debug, Clone)]
pub struct DampedLeastSquares {
    pub max_iterations: usize,
    /// Meters.
    pub position_tolerance: f64,
    /// Radians.
    pub orientation_tolerance: f64,
    pub damping: f64,
    /// Finite-difference step.
    pub perturbation: f64,
}

impl Default for DampedLeastSquares {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            position_tolerance: 1e-4,
            orientation_tolerance: 1e-3,
            damping: 0.01,
            perturbation: 1e-6,
        }
    }
}

/// `[position; rotation]` displacement taking `from` to `to`, world frame.
fn pose_delta(
    from: &Pose,
    to_position: &Vector3<f64>,
    to_orientation: &UnitQuaternion<f64>,
) -> Vector6<f64> {
    let p = to_position - from.position;
    let r = (to_orientation * from.orientation.inverse()).scaled_axis();
    Vector6::new(p.x, p.y, p.z, r.x, r.y, r.z)
}

fn error_norms(error: &Vector6<f64>) -> (f64, f64) {
    (
        error.fixed_rows::<3>(0).norm(),
        error.fixed_rows::<3>(3).norm(),
    )
}

fn apply<E: PhysicsEngine + ?Sized>(
    engine: &mut E,
    body: BodyId,
    joints: &[JointIndex],
    values: &[f64],
) -> Result<()> {
    for (joint, value) in joints.iter().zip(values) {
        engine.reset_joint_state(body, *joint, *value, 0.)?;
    }
    Ok(())
}

impl DampedLeastSquares {
    fn jacobian<E: PhysicsEngine + ?Sized>(
        &self,
        engine: &mut E,
        request: &NumericIkRequest<'_>,
        records: &[JointRecord],
        q: &[f64],
        pose: &Pose,
    ) -> Result<DMatrix<f64>> {
        let link = LinkIndex::Child(request.end_effector);
        let mut jacobian = DMatrix::zeros(6, q.len());
        for (column, (record, value)) in records.iter().zip(q).enumerate() {
            if !record.is_movable() {
                continue;
            }
            let mut h = self.perturbation;
            if record.lower_limit <= record.upper_limit && value + h > record.upper_limit {
                h = -h;
            }
            engine.reset_joint_state(request.body, record.index, value + h, 0.)?;
            let moved = engine.link_world_pose(request.body, link)?;
            engine.reset_joint_state(request.body, record.index, *value, 0.)?;
            let delta = pose_delta(pose, &moved.position, &moved.orientation) / h;
            jacobian.column_mut(column).copy_from(&delta);
        }
        Ok(jacobian)
    }

    fn iterate<E: PhysicsEngine + ?Sized>(
        &self,
        engine: &mut E,
        request: &NumericIkRequest<'_>,
        records: &[JointRecord],
        mut q: Vec<f64>,
    ) -> Result<Vec<f64>> {
        let link = LinkIndex::Child(request.end_effector);
        let mut iterations = 0;

        loop {
            apply(engine, request.body, request.joints, &q)?;
            let pose = engine.link_world_pose(request.body, link)?;
            let error = pose_delta(&pose, &request.target_position, &request.target_orientation);
            let (position_error, orientation_error) = error_norms(&error);
            trace!(iterations, position_error, orientation_error, "numeric ik step");

            if position_error <= self.position_tolerance
                && orientation_error <= self.orientation_tolerance
            {
                debug!(iterations, "numeric ik converged");
                return Ok(q);
            }

            // dq = J^T (J J^T + lambda^2 I)^-1 e
            let jacobian = self.jacobian(engine, request, records, &q, &pose)?;
            let damped = &jacobian * jacobian.transpose()
                + DMatrix::identity(6, 6) * (self.damping * self.damping);
            let inverse = match damped.try_inverse() {
                Some(inverse) if iterations < self.max_iterations => inverse,
                _ if request.validate => {
                    warn!(
                        iterations,
                        position_error, orientation_error, "numeric ik did not converge"
                    );
                    return Err(IkFailure::NotConverged {
                        iterations,
                        position_error,
                        orientation_error,
                    }
                    .into());
                }
                _ => return Ok(q),
            };
            let dq =
                jacobian.transpose() * inverse * DVector::from_column_slice(error.as_slice());
            for ((value, step), record) in q.iter_mut().zip(dq.iter()).zip(records) {
                if record.is_movable() {
                    *value = record.clamp(*value + step);
                }
            }
            iterations += 1;
        }
    }
}

impl NumericIkSolver for DampedLeastSquares {
    fn solve<E: PhysicsEngine + ?Sized>(
        &self,
        engine: &mut E,
        request: &NumericIkRequest<'_>,
    ) -> Result<Vec<f64>> {
        let records = request
            .joints
            .iter()
            .map(|joint| engine.joint_info(request.body, *joint))
            .collect::<Result<Vec<_>>>()?;
        let saved = request
            .joints
            .iter()
            .map(|joint| engine.joint_state(request.body, *joint))
            .collect::<Result<Vec<JointState>>>()?;
        let seed = records
            .iter()
            .zip(&saved)
            .map(|(record, state)| {
                if record.is_movable() {
                    record.clamp(state.position)
                } else {
                    state.position
                }
            })
            .collect();

        let result = self.iterate(engine, request, &records, seed);

        let mut restored = Ok(());
        for (joint, state) in request.joints.iter().zip(&saved) {
            if let Err(e) =
                engine.reset_joint_state(request.body, *joint, state.position, state.velocity)
            {
                restored = Err(e);
            }
        }
        let q = result?;
        restored?;
        Ok(q)
    }
}

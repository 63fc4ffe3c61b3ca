use crate::descriptor::IkFastProfile;
use crate::{Pose, Result};

/// Input handed to a closed-form solver.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticIkRequest<'a> {
    pub profile: &'a IkFastProfile,
    /// Current arm joint values, fingers excluded, chain-ordered.
    pub seed: &'a [f64],
    /// World-frame target for the end effector.
    pub target: &'a Pose,
    pub world_from_base: &'a Pose,
}

impl AnalyticIkRequest<'_> {
    /// Target expressed in the robot base frame.
    pub fn target_in_base(&self) -> Pose {
        self.world_from_base.inverse() * *self.target
    }
}

/// Closed-form IK for one robot model.
///
/// Returns arm-only solutions (no finger values), closest to the seed first.
/// An empty list means the target is unreachable.
pub trait AnalyticIkSolver {
    fn solve(&self, request: &AnalyticIkRequest<'_>) -> Result<Vec<Vec<f64>>>;
}

impl<S: AnalyticIkSolver + ?Sized> AnalyticIkSolver for Box<S> {
    fn solve(&self, request: &AnalyticIkRequest<'_>) -> Result<Vec<Vec<f64>>> {
        (**self).solve(request)
    }
}

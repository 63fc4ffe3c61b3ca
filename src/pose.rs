//! 6-DOF pose: position plus unit-quaternion orientation.

use std::fmt;
use std::ops::Mul;

use approx::{AbsDiffEq, RelativeEq};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    pub fn from_position(position: [f64; 3]) -> Self {
        Self::new(position.into(), UnitQuaternion::identity())
    }

    /// Build from a position and an `[x, y, z, w]` quaternion, normalizing it.
    pub fn from_parts(position: [f64; 3], orientation: [f64; 4]) -> Self {
        let [x, y, z, w] = orientation;
        Self::new(
            position.into(),
            UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
        )
    }

    pub fn from_rpy(position: [f64; 3], roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            position.into(),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    /// Orientation as `[x, y, z, w]`.
    pub fn orientation_xyzw(&self) -> [f64; 4] {
        let q = self.orientation.quaternion();
        [q.i, q.j, q.k, q.w]
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    pub fn inverse(&self) -> Self {
        self.to_isometry().inverse().into()
    }

    /// Rigid-transform composition: `self` then `other` expressed in `self`'s frame.
    pub fn multiply(&self, other: &Pose) -> Self {
        (self.to_isometry() * other.to_isometry()).into()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Isometry3<f64>> for Pose {
    fn from(iso: Isometry3<f64>) -> Self {
        Self::new(iso.translation.vector, iso.rotation)
    }
}

impl From<Pose> for Isometry3<f64> {
    fn from(pose: Pose) -> Self {
        pose.to_isometry()
    }
}

impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        self.multiply(&rhs)
    }
}

impl<'a> Mul<&'a Pose> for &'a Pose {
    type Output = Pose;

    fn mul(self, rhs: &'a Pose) -> Pose {
        self.multiply(rhs)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.position;
        let [x, y, z, w] = self.orientation_xyzw();
        write!(
            f,
            "Pose(position=[{:.4}, {:.4}, {:.4}], orientation=[{:.4}, {:.4}, {:.4}, {:.4}])",
            p.x, p.y, p.z, x, y, z, w
        )
    }
}

impl AbsDiffEq for Pose {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.position.abs_diff_eq(&other.position, epsilon)
            && self.orientation.abs_diff_eq(&other.orientation, epsilon)
    }
}

impl RelativeEq for Pose {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        self.position
            .relative_eq(&other.position, epsilon, max_relative)
            && self
                .orientation
                .relative_eq(&other.orientation, epsilon, max_relative)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use core::f64::consts::FRAC_PI_2;

    #[test]
    fn test_identity() {
        let pose = Pose::identity();
        assert_eq!(pose.position, Vector3::zeros());
        assert_eq!(pose.orientation_xyzw(), [0., 0., 0., 1.]);
        assert_eq!(Pose::default(), pose);
    }

    #[test]
    fn test_compose() {
        let base = Pose::from_rpy([1., 0., 0.], 0., 0., FRAC_PI_2);
        let offset = Pose::from_position([1., 0., 0.]);
        let res = base * offset;
        assert_relative_eq!(res.position, Vector3::new(1., 1., 0.), epsilon = 1e-12);
        assert_relative_eq!(res.orientation, base.orientation, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse() {
        let pose = Pose::from_rpy([0.3, -0.2, 0.5], 0.1, 0.4, -0.7);
        let res = &pose * &pose.inverse();
        assert_abs_diff_eq!(res, Pose::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_from_parts_normalizes() {
        let pose = Pose::from_parts([0., 0., 0.], [0., 0., 2., 0.]);
        assert_relative_eq!(pose.orientation_xyzw()[2], 1., epsilon = 1e-12);
    }
}

//! Arm chain: the joints from the base to the end effector, sorted by index,
//! followed by the left and right finger joints.
//!
//! Every joint-position vector handled by a [`crate::RobotModel`] is ordered
//! like [`ArmChain::joints`].

use std::collections::HashSet;

use tracing::debug;

use crate::engine::{JointIndex, LinkIndex};
use crate::error::ChainBuildError;
use crate::joint_graph::JointGraph;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmChain {
    joints: Vec<JointIndex>,
    end_effector: JointIndex,
    left_finger_slot: usize,
    right_finger_slot: usize,
}

impl ArmChain {
    /// Walk parent links from `end_effector` down to the base link, sort the
    /// visited joints and append the two fingers.
    pub fn build(
        graph: &JointGraph,
        end_effector: JointIndex,
        left_finger: JointIndex,
        right_finger: JointIndex,
    ) -> Result<Self, ChainBuildError> {
        if graph.joint(end_effector).is_none() {
            return Err(ChainBuildError::MissingEndEffector(end_effector.to_string()));
        }
        for finger in [left_finger, right_finger] {
            if graph.joint(finger).is_none() {
                return Err(ChainBuildError::MissingFinger(finger.to_string()));
            }
        }
        if left_finger == right_finger {
            return Err(ChainBuildError::SameFinger(left_finger));
        }

        let mut joints = Vec::new();
        let mut visited = HashSet::new();
        let mut child = end_effector;
        let mut current = LinkIndex::Child(end_effector);
        while let LinkIndex::Child(joint) = current {
            let Some(record) = graph.joint(joint) else {
                return Err(ChainBuildError::Disconnected {
                    joint: child,
                    parent: current,
                });
            };
            if !visited.insert(joint) {
                return Err(ChainBuildError::Cycle(end_effector));
            }
            joints.push(joint);
            child = joint;
            current = record.parent_link;
        }
        for finger in [left_finger, right_finger] {
            if visited.contains(&finger) {
                return Err(ChainBuildError::FingerInArm(finger));
            }
        }

        // joint numbering is topological, so ascending order runs base to tip
        joints.sort_unstable();
        let arm_len = joints.len();
        joints.extend([left_finger, right_finger]);
        debug!(?joints, end_effector, "built arm chain");

        Ok(Self {
            joints,
            end_effector,
            left_finger_slot: arm_len,
            right_finger_slot: arm_len + 1,
        })
    }

    pub fn joints(&self) -> &[JointIndex] {
        &self.joints
    }

    /// Chain joints without the fingers.
    pub fn arm_joints(&self) -> &[JointIndex] {
        &self.joints[..self.arm_len()]
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn arm_len(&self) -> usize {
        self.joints.len() - 2
    }

    pub fn end_effector(&self) -> JointIndex {
        self.end_effector
    }

    pub fn left_finger(&self) -> JointIndex {
        self.joints[self.left_finger_slot]
    }

    pub fn right_finger(&self) -> JointIndex {
        self.joints[self.right_finger_slot]
    }

    /// Position of the left finger within chain-ordered vectors.
    pub fn left_finger_slot(&self) -> usize {
        self.left_finger_slot
    }

    pub fn right_finger_slot(&self) -> usize {
        self.right_finger_slot
    }

    pub fn slot_of(&self, joint: JointIndex) -> Option<usize> {
        self.joints.iter().position(|j| *j == joint)
    }

    pub fn check_len(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.len() {
            return Err(Error::DimensionMismatch {
                expected: self.len(),
                actual: values.len(),
            });
        }
        Ok(())
    }

    /// Expand an arm-only vector to a chain-ordered one with `value` in both
    /// finger slots.
    pub fn insert_fingers(&self, arm_only: &[f64], value: f64) -> Result<Vec<f64>> {
        if arm_only.len() != self.arm_len() {
            return Err(Error::DimensionMismatch {
                expected: self.arm_len(),
                actual: arm_only.len(),
            });
        }
        // lower slot first so the second insert lands where it should
        let (first, second) = if self.left_finger_slot < self.right_finger_slot {
            (self.left_finger_slot, self.right_finger_slot)
        } else {
            (self.right_finger_slot, self.left_finger_slot)
        };
        let mut values = arm_only.to_vec();
        values.insert(first, value);
        values.insert(second, value);
        Ok(values)
    }

    /// Drop the finger slots from a chain-ordered vector.
    pub fn strip_fingers(&self, values: &[f64]) -> Result<Vec<f64>> {
        self.check_len(values)?;
        Ok(values
            .iter()
            .enumerate()
            .filter(|(slot, _)| *slot != self.left_finger_slot && *slot != self.right_finger_slot)
            .map(|(_, value)| *value)
            .collect())
    }
}

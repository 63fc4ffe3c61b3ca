//! Typed view over every joint and link of one loaded body.

use std::collections::HashMap;

use crate::engine::{BodyId, JointIndex, JointRecord, LinkIndex, PhysicsEngine};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct JointGraph {
    base_link_name: String,
    joints: Vec<JointRecord>,
    by_name: HashMap<String, JointIndex>,
    by_link_name: HashMap<String, JointIndex>,
}

impl JointGraph {
    /// Query all joint records of `body`, in index order.
    pub fn query<E: PhysicsEngine + ?Sized>(engine: &E, body: BodyId) -> Result<Self> {
        let count = engine.num_joints(body)?;
        let joints = (0..count)
            .map(|index| engine.joint_info(body, index))
            .collect::<Result<Vec<_>>>()?;
        Self::from_records(engine.base_link_name(body)?, joints)
    }

    pub fn from_records(base_link_name: String, joints: Vec<JointRecord>) -> Result<Self> {
        let mut by_name = HashMap::new();
        let mut by_link_name = HashMap::new();
        for (position, joint) in joints.iter().enumerate() {
            if joint.index != position {
                return Err(Error::InvalidDescription(format!(
                    "joint {} reports index {} at position {}",
                    joint.name, joint.index, position
                )));
            }
            by_name.entry(joint.name.clone()).or_insert(position);
            by_link_name.entry(joint.link_name.clone()).or_insert(position);
        }
        Ok(Self {
            base_link_name,
            joints,
            by_name,
            by_link_name,
        })
    }

    pub fn base_link_name(&self) -> &str {
        &self.base_link_name
    }

    pub fn joints(&self) -> &[JointRecord] {
        &self.joints
    }

    pub fn joint(&self, index: JointIndex) -> Option<&JointRecord> {
        self.joints.get(index)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joint_names(&self) -> impl Iterator<Item = &str> {
        self.joints.iter().map(|joint| joint.name.as_str())
    }

    pub fn joint_from_name(&self, name: &str) -> Result<JointIndex> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownJointName(name.to_string()))
    }

    /// Every non-base link is owned by the joint of the same index.
    pub fn link_from_name(&self, name: &str) -> Result<LinkIndex> {
        if name == self.base_link_name {
            return Ok(LinkIndex::Base);
        }
        self.by_link_name
            .get(name)
            .map(|index| LinkIndex::Child(*index))
            .ok_or_else(|| Error::UnknownLinkName(name.to_string()))
    }
}

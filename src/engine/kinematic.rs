use std::{collections::HashMap, path::Path};

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use petgraph::{graphmap::DiGraphMap, visit::Bfs, Direction};
use tracing::{debug, info};

use super::{BodyId, JointIndex, JointKind, JointRecord, JointState, LinkIndex, PhysicsEngine};
use crate::{Error, Pose, Result};

const DEFAULT_TIME_STEP: f64 = 1. / 240.;

#[derive(Debug, Clone)]
struct EngineJoint {
    record: JointRecord,
    origin: Isometry3<f64>,
    axis: Unit<Vector3<f64>>,
    max_velocity: f64,
}

impl EngineJoint {
    fn from_urdf(index: JointIndex, joint: &urdf_rs::Joint, parent_link: LinkIndex) -> Result<Self> {
        use urdf_rs::JointType;

        let kind = match joint.joint_type {
            JointType::Revolute | JointType::Continuous => JointKind::Revolute,
            JointType::Prismatic => JointKind::Prismatic,
            JointType::Fixed => JointKind::Fixed,
            _ => JointKind::Other,
        };
        let (lower_limit, upper_limit) = match joint.joint_type {
            JointType::Revolute | JointType::Prismatic => (joint.limit.lower, joint.limit.upper),
            JointType::Continuous => (f64::NEG_INFINITY, f64::INFINITY),
            _ => (0., 0.),
        };
        let axis = match Unit::try_new(Vector3::from(joint.axis.xyz.0), 1e-12) {
            Some(axis) => axis,
            None if kind == JointKind::Fixed => Vector3::x_axis(),
            None => {
                return Err(Error::InvalidDescription(format!(
                    "joint {} has a zero-length axis",
                    joint.name
                )))
            }
        };
        Ok(Self {
            record: JointRecord {
                index,
                name: joint.name.clone(),
                kind,
                lower_limit,
                upper_limit,
                parent_link,
                link_name: joint.child.link.clone(),
            },
            origin: origin_to_isometry(&joint.origin),
            axis,
            max_velocity: joint.limit.velocity,
        })
    }

    /// Transform contributed by the joint's own displacement.
    fn motion(&self, position: f64) -> Isometry3<f64> {
        match self.record.kind {
            JointKind::Revolute => Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&self.axis, position),
            ),
            JointKind::Prismatic => Isometry3::from_parts(
                Translation3::from(self.axis.into_inner() * position),
                UnitQuaternion::identity(),
            ),
            JointKind::Fixed | JointKind::Other => Isometry3::identity(),
        }
    }
}

fn origin_to_isometry(origin: &urdf_rs::Pose) -> Isometry3<f64> {
    let rpy = origin.rpy.0;
    let xyz = origin.xyz.0;
    Isometry3::from_parts(
        Translation3::new(xyz[0], xyz[1], xyz[2]),
        UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
    )
}

#[derive(Debug, Clone)]
struct Body {
    name: String,
    base_link_name: String,
    base_pose: Isometry3<f64>,
    joints: Vec<EngineJoint>,
    states: Vec<JointState>,
    targets: Vec<Option<f64>>,
}

impl Body {
    fn joint(&self, id: BodyId, joint: JointIndex) -> Result<&EngineJoint> {
        self.joints
            .get(joint)
            .ok_or(Error::UnknownJoint { body: id, joint })
    }
}

struct BfsIter<'a> {
    graph: &'a DiGraphMap<usize, usize>,
    bfs: Bfs<usize, std::collections::HashSet<usize>>,
}

impl<'a> Iterator for BfsIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        self.bfs.next(self.graph)
    }
}

/// Number joints breadth-first from the root link so that every joint's
/// index is larger than its parent's.
fn parse_robot(robot: urdf_rs::Robot, base_pose: &Pose) -> Result<Body> {
    let link_index: HashMap<&str, usize> = robot
        .links
        .iter()
        .enumerate()
        .map(|(index, link)| (link.name.as_str(), index))
        .collect();
    let find_link = |joint: &urdf_rs::Joint, name: &str| {
        link_index.get(name).copied().ok_or_else(|| {
            Error::InvalidDescription(format!(
                "joint {} references unknown link {}",
                joint.name, name
            ))
        })
    };

    // link index graph, edge weight = joint position in the description
    let mut graph = DiGraphMap::<usize, usize>::new();
    for index in 0..robot.links.len() {
        graph.add_node(index);
    }
    for (joint_index, joint) in robot.joints.iter().enumerate() {
        let parent = find_link(joint, &joint.parent.link)?;
        let child = find_link(joint, &joint.child.link)?;
        if graph
            .neighbors_directed(child, Direction::Incoming)
            .next()
            .is_some()
        {
            return Err(Error::InvalidDescription(format!(
                "link {} has more than one parent joint",
                joint.child.link
            )));
        }
        graph.add_edge(parent, child, joint_index);
    }

    let roots: Vec<usize> = graph
        .nodes()
        .filter(|node| {
            graph
                .neighbors_directed(*node, Direction::Incoming)
                .next()
                .is_none()
        })
        .collect();
    let &[root] = roots.as_slice() else {
        return Err(Error::InvalidDescription(format!(
            "expected exactly one root link, found {}",
            roots.len()
        )));
    };

    let order: Vec<usize> = BfsIter {
        graph: &graph,
        bfs: Bfs::new(&graph, root),
    }
    .collect();

    let mut link_to_joint: HashMap<usize, JointIndex> = HashMap::new();
    let mut joints = Vec::with_capacity(robot.joints.len());
    for link in order {
        let Some(parent) = graph.neighbors_directed(link, Direction::Incoming).next() else {
            continue;
        };
        let Some(&description_index) = graph.edge_weight(parent, link) else {
            continue;
        };
        let parent_link = link_to_joint
            .get(&parent)
            .map_or(LinkIndex::Base, |joint| LinkIndex::Child(*joint));
        let index = joints.len();
        link_to_joint.insert(link, index);
        joints.push(EngineJoint::from_urdf(
            index,
            &robot.joints[description_index],
            parent_link,
        )?);
    }
    if joints.len() != robot.joints.len() {
        return Err(Error::InvalidDescription(format!(
            "{} joints are unreachable from root link {}",
            robot.joints.len() - joints.len(),
            robot.links[root].name
        )));
    }

    let joint_count = joints.len();
    Ok(Body {
        name: robot.name,
        base_link_name: robot.links[root].name.clone(),
        base_pose: base_pose.to_isometry(),
        joints,
        states: vec![JointState::default(); joint_count],
        targets: vec![None; joint_count],
    })
}

/// In-process kinematic engine backed by URDF descriptions.
///
/// Bodies have fixed bases. Reset calls teleport joints; motor targets are
/// tracked by [`KinematicEngine::step_simulation`], which moves each
/// commanded joint toward its target no faster than its velocity limit.
#[derive(Debug, Clone)]
pub struct KinematicEngine {
    bodies: Vec<Body>,
    time_step: f64,
}

impl Default for KinematicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KinematicEngine {
    pub fn new() -> Self {
        Self::with_time_step(DEFAULT_TIME_STEP)
    }

    pub fn with_time_step(time_step: f64) -> Self {
        Self {
            bodies: Vec::new(),
            time_step,
        }
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn load_urdf_str(&mut self, urdf: &str, base_pose: &Pose) -> Result<BodyId> {
        let robot = urdf_rs::read_from_string(urdf)?;
        self.add_body(robot, base_pose)
    }

    pub fn body_name(&self, body: BodyId) -> Result<&str> {
        Ok(self.body(body)?.name.as_str())
    }

    /// Advance every position-controlled joint by one time step.
    pub fn step_simulation(&mut self) {
        let dt = self.time_step;
        for body in &mut self.bodies {
            for ((joint, state), target) in body
                .joints
                .iter()
                .zip(body.states.iter_mut())
                .zip(body.targets.iter())
            {
                let Some(target) = target else {
                    continue;
                };
                let delta = joint.record.clamp(*target) - state.position;
                let max_step = joint.max_velocity * dt;
                let step = if max_step > 0. {
                    delta.clamp(-max_step, max_step)
                } else {
                    delta
                };
                state.position += step;
                state.velocity = if dt > 0. { step / dt } else { 0. };
            }
        }
    }

    fn add_body(&mut self, robot: urdf_rs::Robot, base_pose: &Pose) -> Result<BodyId> {
        let body = parse_robot(robot, base_pose)?;
        let id = BodyId(self.bodies.len());
        info!(body = id.0, name = %body.name, joints = body.joints.len(), "loaded robot");
        self.bodies.push(body);
        Ok(id)
    }

    fn body(&self, id: BodyId) -> Result<&Body> {
        self.bodies.get(id.0).ok_or(Error::UnknownBody(id))
    }

    fn body_mut(&mut self, id: BodyId) -> Result<&mut Body> {
        self.bodies.get_mut(id.0).ok_or(Error::UnknownBody(id))
    }
}

impl PhysicsEngine for KinematicEngine {
    fn load_robot(&mut self, urdf_path: &Path, base_pose: &Pose) -> Result<BodyId> {
        debug!(path = %urdf_path.display(), "reading robot description");
        let robot = urdf_rs::read_file(urdf_path)?;
        self.add_body(robot, base_pose)
    }

    fn base_link_name(&self, body: BodyId) -> Result<String> {
        Ok(self.body(body)?.base_link_name.clone())
    }

    fn num_joints(&self, body: BodyId) -> Result<usize> {
        Ok(self.body(body)?.joints.len())
    }

    fn joint_info(&self, body: BodyId, joint: JointIndex) -> Result<JointRecord> {
        Ok(self.body(body)?.joint(body, joint)?.record.clone())
    }

    fn joint_state(&self, body: BodyId, joint: JointIndex) -> Result<JointState> {
        self.body(body)?
            .states
            .get(joint)
            .copied()
            .ok_or(Error::UnknownJoint { body, joint })
    }

    fn reset_joint_state(
        &mut self,
        body: BodyId,
        joint: JointIndex,
        position: f64,
        velocity: f64,
    ) -> Result<()> {
        let state = self
            .body_mut(body)?
            .states
            .get_mut(joint)
            .ok_or(Error::UnknownJoint { body, joint })?;
        *state = JointState { position, velocity };
        Ok(())
    }

    fn link_world_pose(&self, body_id: BodyId, link: LinkIndex) -> Result<Pose> {
        let body = self.body(body_id)?;
        let mut pose = Isometry3::identity();
        let mut current = link;
        while let LinkIndex::Child(index) = current {
            let joint = body.joint(body_id, index)?;
            pose = joint.origin * joint.motion(body.states[index].position) * pose;
            current = joint.record.parent_link;
        }
        Ok((body.base_pose * pose).into())
    }

    fn set_joint_motor_targets(
        &mut self,
        body_id: BodyId,
        joints: &[JointIndex],
        targets: &[f64],
    ) -> Result<()> {
        if joints.len() != targets.len() {
            return Err(Error::DimensionMismatch {
                expected: joints.len(),
                actual: targets.len(),
            });
        }
        let body = self.body_mut(body_id)?;
        if let Some(&joint) = joints.iter().find(|joint| **joint >= body.joints.len()) {
            return Err(Error::UnknownJoint {
                body: body_id,
                joint,
            });
        }
        for (joint, target) in joints.iter().zip(targets) {
            body.targets[*joint] = Some(*target);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::ARM_URDF;
    use approx::assert_relative_eq;
    use core::f64::consts::FRAC_PI_2;

    fn load() -> (KinematicEngine, BodyId) {
        let mut engine = KinematicEngine::new();
        let body = engine.load_urdf_str(ARM_URDF, &Pose::identity()).unwrap();
        (engine, body)
    }

    #[test]
    fn test_breadth_first_numbering() {
        let (engine, body) = load();
        assert_eq!(engine.body_name(body).unwrap(), "two_finger_arm");
        assert_eq!(engine.base_link_name(body).unwrap(), "base_link");
        let names: Vec<_> = (0..engine.num_joints(body).unwrap())
            .map(|i| engine.joint_info(body, i).unwrap().name)
            .collect();
        assert_eq!(
            names,
            [
                "joint1",
                "camera_joint",
                "joint2",
                "joint3",
                "hand_joint",
                "tool_joint",
                "left_finger_joint",
                "right_finger_joint"
            ]
        );
        for index in 0..names.len() {
            let record = engine.joint_info(body, index).unwrap();
            if let LinkIndex::Child(parent) = record.parent_link {
                assert!(parent < index);
            }
        }
    }

    #[test]
    fn test_joint_records() {
        let (engine, body) = load();
        let joint2 = engine.joint_info(body, 2).unwrap();
        assert_eq!(joint2.kind, JointKind::Revolute);
        assert_eq!(joint2.parent_link, LinkIndex::Child(0));
        assert_eq!(joint2.link_name, "link2");
        assert_eq!((joint2.lower_limit, joint2.upper_limit), (-1.8, 1.8));

        let tool = engine.joint_info(body, 5).unwrap();
        assert_eq!(tool.kind, JointKind::Fixed);

        let finger = engine.joint_info(body, 6).unwrap();
        assert_eq!(finger.kind, JointKind::Prismatic);
        assert_eq!((finger.lower_limit, finger.upper_limit), (0., 0.04));

        assert_eq!(engine.joint_info(body, 0).unwrap().parent_link, LinkIndex::Base);
        assert!(matches!(
            engine.joint_info(body, 8),
            Err(Error::UnknownJoint { joint: 8, .. })
        ));
    }

    #[test]
    fn test_link_world_pose() {
        let (mut engine, body) = load();
        let tool = engine.link_world_pose(body, LinkIndex::Child(5)).unwrap();
        assert_relative_eq!(tool.position, Vector3::new(0.3, 0., 0.7), epsilon = 1e-12);

        engine.reset_joint_state(body, 2, FRAC_PI_2, 0.).unwrap();
        let tool = engine.link_world_pose(body, LinkIndex::Child(5)).unwrap();
        assert_relative_eq!(tool.position, Vector3::new(0.3, 0., 0.1), epsilon = 1e-12);

        let base = engine.link_world_pose(body, LinkIndex::Base).unwrap();
        assert_relative_eq!(base, Pose::identity());
    }

    #[test]
    fn test_base_pose() {
        let mut engine = KinematicEngine::new();
        let base = Pose::from_rpy([1., 2., 0.], 0., 0., FRAC_PI_2);
        let body = engine.load_urdf_str(ARM_URDF, &base).unwrap();
        let tool = engine.link_world_pose(body, LinkIndex::Child(5)).unwrap();
        assert_relative_eq!(tool.position, Vector3::new(1., 2.3, 0.7), epsilon = 1e-12);
    }

    #[test]
    fn test_prismatic_finger() {
        let (mut engine, body) = load();
        engine.reset_joint_state(body, 6, 0.03, 0.).unwrap();
        let finger = engine.link_world_pose(body, LinkIndex::Child(6)).unwrap();
        assert_relative_eq!(finger.position, Vector3::new(0.2, 0.04, 0.7), epsilon = 1e-12);
    }

    #[test]
    fn test_step_simulation() {
        let (mut engine, body) = load();
        engine
            .set_joint_motor_targets(body, &[0, 6], &[0.5, 1.])
            .unwrap();
        engine.step_simulation();
        let dt = engine.time_step();
        let state = engine.joint_state(body, 0).unwrap();
        assert_relative_eq!(state.position, 2. * dt, epsilon = 1e-12);
        assert_relative_eq!(state.velocity, 2., epsilon = 1e-9);

        for _ in 0..1000 {
            engine.step_simulation();
        }
        assert_relative_eq!(engine.joint_state(body, 0).unwrap().position, 0.5, epsilon = 1e-12);
        // clamped to the finger's upper limit
        assert_relative_eq!(engine.joint_state(body, 6).unwrap().position, 0.04, epsilon = 1e-12);
    }

    #[test]
    fn test_motor_targets_checked() {
        let (mut engine, body) = load();
        assert!(matches!(
            engine.set_joint_motor_targets(body, &[0, 1], &[0.]),
            Err(Error::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            engine.set_joint_motor_targets(body, &[0, 42], &[0., 0.]),
            Err(Error::UnknownJoint { joint: 42, .. })
        ));
        assert!(matches!(
            engine.num_joints(BodyId(3)),
            Err(Error::UnknownBody(BodyId(3)))
        ));
    }

    #[test]
    fn test_two_roots_rejected() {
        let link = |name: &str| {
            format!(
                r#"<link name="{name}"><inertial><mass value="1"/>
                <inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/></inertial></link>"#
            )
        };
        let urdf = format!(r#"<robot name="broken">{}{}</robot>"#, link("a"), link("b"));
        let mut engine = KinematicEngine::new();
        assert!(matches!(
            engine.load_urdf_str(&urdf, &Pose::identity()),
            Err(Error::InvalidDescription(_))
        ));
    }
}

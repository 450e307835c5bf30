//! Bind pose computation.

use cgmath::{EuclideanSpace, InnerSpace, SquareMatrix};
use std::cmp::Ordering;

use math::change_orientation;
use mesh::JointPositions;
use rig::JointRef;
use super::{PoseState, Skeleton};
use {Position, Transform, Vector};

/// Bending reference of bones without a rotation plane.
const DEFAULT_NORMAL: Vector = Vector { x: 0.0, y: 1.0, z: 0.0 };

fn normalized(v: Vector) -> Option<Vector> {
    let length = v.magnitude();
    if length > 1e-9 {
        Some(v / length)
    } else {
        None
    }
}

/// Orthonormal bone frame at `head`.
///
/// Local Y points from head to tail, local X is `normal` made orthogonal to Y,
/// and local Z completes the right-handed frame. When `normal` runs along the
/// bone, the world axis least aligned with the bone takes its place.
pub fn rest_frame(head: Position, tail: Position, normal: Vector) -> Transform {
    let y = normalized(tail - head).unwrap_or_else(|| {
        warn!("Zero length bone at {:?}", head);
        Vector::unit_y()
    });
    let x = normalized(normal - y * normal.dot(y)).unwrap_or_else(|| {
        let axis = [Vector::unit_x(), Vector::unit_y(), Vector::unit_z()]
            .iter()
            .cloned()
            .min_by(|a, b| {
                a.dot(y).abs().partial_cmp(&b.dot(y).abs()).unwrap_or(Ordering::Equal)
            })
            .unwrap_or(Vector::unit_x());
        (axis - y * axis.dot(y)).normalize()
    });
    let z = x.cross(y);
    Transform::from_cols(x.extend(0.0), y.extend(0.0), z.extend(0.0), head.to_homogeneous())
}

impl Skeleton {
    /// Position of a joint: the mean of its vertices, or the literal position.
    pub fn joint_position<M>(&self, joint: &JointRef, mesh: &M) -> Position
    where
        M: JointPositions + ?Sized,
    {
        match *joint {
            JointRef::Position(p) => Position::from(p),
            JointRef::Name(ref name) => match self.joints.get(name) {
                Some(vertices) => mesh.mean_position(vertices),
                None => {
                    warn!("Joint {} is not defined", name);
                    Position::origin()
                }
            },
        }
    }

    /// Normal of a rotation plane, counter-clockwise through its three joints.
    ///
    /// Bones without a plane, and planes that cannot be resolved or are
    /// degenerate, use `(0, 1, 0)`.
    pub fn plane_normal<M>(&self, plane: Option<&str>, mesh: &M) -> Vector
    where
        M: JointPositions + ?Sized,
    {
        let slots = match plane.and_then(|name| self.planes.get(name)) {
            Some(slots) => slots,
            None => return DEFAULT_NORMAL,
        };
        let mut v = [Position::origin(); 3];
        for (position, slot) in v.iter_mut().zip(slots.iter()) {
            match *slot {
                Some(ref joint) => *position = self.joint_position(&JointRef::Name(joint.clone()), mesh),
                None => return DEFAULT_NORMAL,
            }
        }

        let primary = normalized(v[1] - v[0]);
        let secondary = normalized(v[2] - v[1]);
        match (primary, secondary) {
            (Some(primary), Some(secondary)) => match normalized(secondary.cross(primary)) {
                Some(normal) => normal,
                None => {
                    warn!("Rotation plane {:?} is degenerate", plane);
                    DEFAULT_NORMAL
                }
            },
            _ => {
                warn!("Rotation plane {:?} has coincident joints", plane);
                DEFAULT_NORMAL
            }
        }
    }

    /// Recomputes every bone's rest matrices from the current joint positions.
    ///
    /// Bones are visited root first, so each bone's relative rest matrix is
    /// taken against the already updated rest matrix of its parent. All
    /// bones go back to the rest pose.
    pub fn calc_rest_matrices<M>(&mut self, mesh: &M)
    where
        M: JointPositions + ?Sized,
    {
        let orientation = self.options.orientation;
        let rot_axis = self.options.rot_axis;
        let offset = self.options.offset();
        let remap = orientation.matrix();

        for i in 0 .. self.bones.len() {
            let (head, tail, normal) = {
                let node = &self.graph.bones()[i];
                (
                    self.joint_position(&node.head, mesh),
                    self.joint_position(&node.tail, mesh),
                    self.plane_normal(node.rotation_plane.as_ref().map(String::as_str), mesh),
                )
            };
            let rest = change_orientation(&rest_frame(head, tail, normal), orientation, rot_axis, offset);
            let rest_inverse = rest.invert().unwrap_or_else(|| {
                warn!("Rest matrix of {} is singular", self.bones[i].name);
                Transform::identity()
            });
            let rest_local = match self.bones[i].parent {
                Some(p) => self.bones[p].rest_inverse * rest,
                None => rest,
            };

            let bone = &mut self.bones[i];
            bone.head = head;
            bone.tail = tail;
            bone.tail_local = rest_inverse * (remap * (tail + offset).to_homogeneous());
            bone.rest = rest;
            bone.rest_inverse = rest_inverse;
            bone.rest_local = rest_local;
            bone.local = rest_local;
            bone.global = rest;
            bone.state = PoseState::Rest;
        }
        debug!("Computed rest matrices for {} bones of {}", self.bones.len(), self.name);
    }

    /// Recomputes the rest pose after the joint-defining vertices moved.
    pub fn reshape<M>(&mut self, mesh: &M)
    where
        M: JointPositions + ?Sized,
    {
        self.calc_rest_matrices(mesh);
    }
}

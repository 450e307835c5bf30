//! Pose propagation.

use cgmath::{Point3, Quaternion};
use mint;
use std::collections::HashMap;

use math::{euler_matrix, quaternion_to_matrix, EulerOrder};
use mesh::Skinning;
use super::{PoseState, Skeleton};
use {to_mint, Orientation, Position, Transform};

/// Rotation applied to a bone on top of its rest pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RotationSource {
    /// Rotation quaternion, not necessarily normalized.
    Quaternion(Orientation),
    /// Homogeneous matrix used as is.
    Matrix(Transform),
    /// Euler angles in radians.
    Euler {
        /// First angle.
        x: f64,
        /// Second angle.
        y: f64,
        /// Third angle.
        z: f64,
        /// Axis sequence.
        order: EulerOrder,
    },
}

impl RotationSource {
    /// Euler angles in the default `xyz` order.
    pub fn euler(x: f64, y: f64, z: f64) -> Self {
        RotationSource::Euler {
            x,
            y,
            z,
            order: EulerOrder::default(),
        }
    }

    /// The rotation as a homogeneous matrix.
    pub fn to_matrix(&self) -> Transform {
        match *self {
            RotationSource::Quaternion(q) => quaternion_to_matrix(q),
            RotationSource::Matrix(m) => m,
            RotationSource::Euler { x, y, z, order } => euler_matrix(x, y, z, order),
        }
    }
}

impl From<Orientation> for RotationSource {
    fn from(q: Orientation) -> Self {
        RotationSource::Quaternion(q)
    }
}

impl From<Transform> for RotationSource {
    fn from(m: Transform) -> Self {
        RotationSource::Matrix(m)
    }
}

impl From<mint::Quaternion<f32>> for RotationSource {
    fn from(q: mint::Quaternion<f32>) -> Self {
        RotationSource::Quaternion(Quaternion::new(q.s as f64, q.v.x as f64, q.v.y as f64, q.v.z as f64))
    }
}

/// Posed matrices of one bone, as handed to a [`Skinning`] implementation.
///
/// [`Skinning`]: ../mesh/trait.Skinning.html
#[derive(Clone, Debug, PartialEq)]
pub struct BoneMatrix {
    /// Bone name.
    pub name: String,
    /// Global pose matrix.
    pub global: mint::ColumnMatrix4<f32>,
    /// Global pose times inverse rest matrix.
    pub skinning: mint::ColumnMatrix4<f32>,
}

impl Skeleton {
    /// Sets the local pose of a bone to its relative rest matrix rotated by
    /// `source`.
    ///
    /// The global matrix is left alone; see
    /// [`calc_global_pose_mat`](#method.calc_global_pose_mat). Returns `false`
    /// if the skeleton has no such bone.
    pub fn calc_local_pose_mat(&mut self, bone: &str, source: &RotationSource) -> bool {
        match self.graph.index_of(bone) {
            Some(i) => {
                self.local_pose_at(i, source);
                true
            }
            None => false,
        }
    }

    /// Sets the global pose of a bone from its parent's global pose.
    ///
    /// The parent must be current. Returns `false` if the skeleton has no
    /// such bone.
    pub fn calc_global_pose_mat(&mut self, bone: &str) -> bool {
        match self.graph.index_of(bone) {
            Some(i) => {
                self.global_pose_at(i);
                true
            }
            None => false,
        }
    }

    fn local_pose_at(&mut self, index: usize, source: &RotationSource) {
        let bone = &mut self.bones[index];
        bone.local = bone.rest_local * source.to_matrix();
        bone.state = PoseState::Posed;
    }

    // Walking the bones in index order keeps every parent current.
    fn global_pose_at(&mut self, index: usize) {
        let global = match self.bones[index].parent {
            Some(p) => self.bones[p].global * self.bones[index].local,
            None => self.bones[index].local,
        };
        self.bones[index].global = global;
    }

    /// Applies rotations to the named bones and deforms the bound mesh.
    ///
    /// Bones are updated root first. Bones missing from `updates` keep their
    /// last global pose, even when an ancestor moved; call
    /// [`refresh`](#method.refresh) to propagate, or [`reset`](#method.reset)
    /// to go back to rest. Names that match no bone are ignored.
    pub fn pose<S>(&mut self, updates: &HashMap<String, RotationSource>, skinning: &mut S)
    where
        S: Skinning + ?Sized,
    {
        for name in updates.keys() {
            if self.graph.index_of(name).is_none() {
                debug!("Skeleton {} has no bone {}", self.name, name);
            }
        }
        for i in 0 .. self.bones.len() {
            let source = match updates.get(self.bones[i].name.as_str()) {
                Some(source) => *source,
                None => continue,
            };
            self.local_pose_at(i, &source);
            self.global_pose_at(i);
        }
        skinning.deform(&self.bone_matrices(), &self.weights);
    }

    /// Puts every bone back into its rest pose.
    pub fn reset(&mut self) {
        for bone in self.bones.iter_mut() {
            bone.local = bone.rest_local;
            bone.global = bone.rest;
            bone.state = PoseState::Rest;
        }
    }

    /// Recomputes the global pose of every bone from the local poses.
    pub fn refresh(&mut self) {
        for i in 0 .. self.bones.len() {
            self.global_pose_at(i);
        }
    }

    /// Current matrices of every bone in topological order.
    pub fn bone_matrices(&self) -> Vec<BoneMatrix> {
        self.bones
            .iter()
            .map(|bone| BoneMatrix {
                name: bone.name.clone(),
                global: to_mint(&bone.global),
                skinning: to_mint(&bone.skinning_matrix()),
            })
            .collect()
    }

    /// Global pose times inverse rest matrix of every bone.
    pub fn skinning_matrices(&self) -> Vec<Transform> {
        self.bones.iter().map(|bone| bone.skinning_matrix()).collect()
    }

    /// Head and tail of every bone in the current pose.
    pub fn bone_segments(&self) -> Vec<(Position, Position)> {
        self.bones
            .iter()
            .map(|bone| {
                let head = Point3::from_homogeneous(bone.global.w);
                let tail = Point3::from_homogeneous(bone.global * bone.tail_local);
                (head, tail)
            })
            .collect()
    }
}

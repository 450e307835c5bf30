//! Skeletal rigging and posing for mesh-bound characters.
//!
//! ## Introduction
//!
//! A rig is described declaratively by joints (groups of mesh vertices),
//! planes (joint triples that give a bending reference) and bones (head and
//! tail joints plus an optional parent). Loading a rig goes through three
//! stages:
//!
//! * [`RigDefinition`] is the document as written, usually parsed from JSON.
//! * [`BoneGraph`] is the validated hierarchy: one root, resolved parents and
//!   a topological bone order.
//! * [`Skeleton`] owns the bones with their rest, local and global matrices.
//!
//! Joint positions come from the bound mesh through the [`JointPositions`]
//! trait, and posed matrices are handed to a [`Skinning`] implementation that
//! deforms the render mesh.
//!
//! ## Walkthrough
//!
//! ```rust,no_run
//! # extern crate armature;
//! # fn main() {
//! use armature::{DataDirs, RigOptions, RotationSource, Skeleton};
//! use std::collections::HashMap;
//!
//! # let vertices: Vec<armature::mint::Point3<f32>> = unimplemented!();
//! # let mut skinning: Vec<armature::BoneMatrix> = Vec::new();
//! let data = DataDirs::new(vec!["/usr/share/armature/data".into()]);
//! let mut skeleton = Skeleton::load(
//!     "default",
//!     "rigs/default.rig",
//!     &vertices[..],
//!     &data,
//!     RigOptions::default(),
//! ).expect("rig");
//!
//! let mut updates = HashMap::new();
//! updates.insert("spine01".to_string(), RotationSource::euler(0.0, 0.3, 0.0));
//! skeleton.pose(&updates, &mut skinning);
//! # }
//! ```
//!
//! [`RigDefinition`]: rig/struct.RigDefinition.html
//! [`BoneGraph`]: graph/struct.BoneGraph.html
//! [`Skeleton`]: skeleton/struct.Skeleton.html
//! [`JointPositions`]: mesh/trait.JointPositions.html
//! [`Skinning`]: mesh/trait.Skinning.html

extern crate cgmath;
extern crate itertools;
#[macro_use]
extern crate log;
pub extern crate mint;
extern crate nalgebra;
#[macro_use]
extern crate quick_error;
extern crate serde;
extern crate serde_json;

#[cfg(test)]
extern crate tempfile;

pub mod animation;
pub mod graph;
pub mod math;
pub mod mesh;
pub mod rig;
pub mod skeleton;
pub mod weights;

mod util;

pub use animation::{Clip, Track, Values};
pub use graph::{BoneGraph, BoneNode, StructuralError};
pub use math::{EulerOrder, ModelOrientation, RotationAxis};
pub use mesh::{JointPositions, Skinning};
pub use rig::{BoneDefinition, JointRef, RigDefinition, RigError};
pub use skeleton::{Bone, BoneMatrix, PoseState, RigOptions, RotationSource, Skeleton};
pub use weights::{DataDirs, DataLocator, WeightTable};

/// Position in model space.
pub type Position = cgmath::Point3<f64>;
/// Direction or offset in model space.
pub type Vector = cgmath::Vector3<f64>;
/// Rotation quaternion, `s` is the scalar part.
pub type Orientation = cgmath::Quaternion<f64>;
/// Homogeneous column-major bone matrix.
pub type Transform = cgmath::Matrix4<f64>;

/// Converts a bone matrix into the single precision layout consumed by
/// renderers and skinning back-ends.
pub fn to_mint(m: &Transform) -> mint::ColumnMatrix4<f32> {
    let column = |c: cgmath::Vector4<f64>| mint::Vector4 {
        x: c.x as f32,
        y: c.y as f32,
        z: c.z as f32,
        w: c.w as f32,
    };
    mint::ColumnMatrix4 {
        x: column(m.x),
        y: column(m.y),
        z: column(m.z),
        w: column(m.w),
    }
}

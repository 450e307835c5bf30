//! Seams to the mesh a skeleton is bound to.
//!
//! The skeleton never reads vertex buffers itself. Joint positions are asked
//! from a [`JointPositions`] implementation, and posed bone matrices are pushed
//! to a [`Skinning`] implementation that deforms the render mesh.
//!
//! [`JointPositions`]: trait.JointPositions.html
//! [`Skinning`]: trait.Skinning.html

use cgmath::{EuclideanSpace, Point3};
use mint;

use skeleton::BoneMatrix;
use weights::WeightTable;
use Position;

/// Source of joint positions, usually the base mesh of a character.
pub trait JointPositions {
    /// Mean position of the given vertices.
    fn mean_position(&self, vertices: &[u32]) -> Position;
}

impl JointPositions for [mint::Point3<f32>] {
    fn mean_position(&self, vertices: &[u32]) -> Position {
        let mut sum = Position::origin();
        let mut count = 0;
        for &index in vertices {
            match self.get(index as usize) {
                Some(v) => {
                    sum += Point3::new(v.x as f64, v.y as f64, v.z as f64).to_vec();
                    count += 1;
                }
                None => warn!("Vertex {} is out of range ({} vertices)", index, self.len()),
            }
        }
        if count == 0 {
            return Position::origin();
        }
        Position::from_vec(sum.to_vec() / count as f64)
    }
}

impl JointPositions for [Position] {
    fn mean_position(&self, vertices: &[u32]) -> Position {
        let points: Vec<Position> = vertices
            .iter()
            .filter_map(|&index| {
                let point = self.get(index as usize).cloned();
                if point.is_none() {
                    warn!("Vertex {} is out of range ({} vertices)", index, self.len());
                }
                point
            })
            .collect();
        if points.is_empty() {
            Position::origin()
        } else {
            Position::centroid(&points)
        }
    }
}

/// Consumer of posed bone matrices.
pub trait Skinning {
    /// Deforms the bound mesh with the given bone matrices.
    ///
    /// `bones` holds every bone of the skeleton in topological order, and
    /// `weights` maps bone names to their `(vertex, weight)` influences.
    fn deform(&mut self, bones: &[BoneMatrix], weights: &WeightTable);
}

/// Keeps the last frame of bone matrices, e.g. for debug bone drawing.
impl Skinning for Vec<BoneMatrix> {
    fn deform(&mut self, bones: &[BoneMatrix], _: &WeightTable) {
        self.clear();
        self.extend_from_slice(bones);
    }
}

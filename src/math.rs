//! Rotation math.
//!
//! Quaternions are `cgmath` quaternions in `(w, x, y, z)` order, where `s` holds
//! the scalar `w` component. Matrices are homogeneous and column-major, so a
//! bone's translation lives in the `w` column.
//!
//! None of these routines fail: degenerate inputs (a near-zero quaternion,
//! near-parallel slerp endpoints, a rotation matrix whose trace branch breaks
//! down) take an explicit fallback branch instead.

use cgmath::{InnerSpace, Rad, SquareMatrix};
use nalgebra;
use serde::Deserialize;
use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::str::FromStr;

use {Orientation, Transform, Vector};

/// Tolerance used by the quaternion routines, four machine epsilons.
pub const EPS: f64 = 4.0 * ::std::f64::EPSILON;

quick_error! {
    #[doc = "Error returned when parsing an orientation convention by name."]
    #[derive(Debug, Clone, PartialEq)]
    pub enum ParseError {
        #[doc = "The name does not match any known convention."]
        Unknown(kind: &'static str, name: String) {
            description("unknown convention name")
            display("unknown {} `{}`", kind, name)
        }
    }
}

/// Builds a matrix from row-major entries.
fn from_rows(r: [[f64; 4]; 4]) -> Transform {
    Transform::new(
        r[0][0], r[1][0], r[2][0], r[3][0],
        r[0][1], r[1][1], r[2][1], r[3][1],
        r[0][2], r[1][2], r[2][2], r[3][2],
        r[0][3], r[1][3], r[2][3], r[3][3],
    )
}

/// Axis order of an Euler rotation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EulerOrder {
    Xyz,
    Xzy,
    Yzx,
    Yxz,
    Zxy,
    Zyx,
}

impl Default for EulerOrder {
    fn default() -> Self {
        EulerOrder::Xyz
    }
}

impl FromStr for EulerOrder {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xyz" => Ok(EulerOrder::Xyz),
            "xzy" => Ok(EulerOrder::Xzy),
            "yzx" => Ok(EulerOrder::Yzx),
            "yxz" => Ok(EulerOrder::Yxz),
            "zxy" => Ok(EulerOrder::Zxy),
            "zyx" => Ok(EulerOrder::Zyx),
            _ => Err(ParseError::Unknown("euler order", s.to_string())),
        }
    }
}

impl EulerOrder {
    /// Axis permutation of the canonical construction, and whether the
    /// angles have to be negated for this order.
    fn axes(self) -> (usize, usize, usize, bool) {
        match self {
            EulerOrder::Xyz => (0, 1, 2, false),
            EulerOrder::Xzy => (0, 2, 1, true),
            EulerOrder::Yzx => (1, 2, 0, false),
            EulerOrder::Yxz => (1, 0, 2, true),
            EulerOrder::Zxy => (2, 0, 1, false),
            EulerOrder::Zyx => (2, 1, 0, true),
        }
    }
}

/// Canonical `xyz` construction with the three axes permuted to `i, j, k`.
fn euler_matrix_ijk(ri: f64, rj: f64, rk: f64, i: usize, j: usize, k: usize) -> Transform {
    let (si, sj, sk) = (ri.sin(), rj.sin(), rk.sin());
    let (ci, cj, ck) = (ri.cos(), rj.cos(), rk.cos());
    let (cc, cs) = (ci * ck, ci * sk);
    let (sc, ss) = (si * ck, si * sk);

    let mut m = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
    m[i][i] = cj * ck;
    m[i][j] = sj * sc - cs;
    m[i][k] = sj * cc + ss;
    m[j][i] = cj * sk;
    m[j][j] = sj * ss + cc;
    m[j][k] = sj * cs - sc;
    m[k][i] = -sj;
    m[k][j] = cj * si;
    m[k][k] = cj * ci;
    from_rows(m)
}

/// Rotation matrix from three Euler angles in radians.
pub fn euler_matrix(x: f64, y: f64, z: f64, order: EulerOrder) -> Transform {
    let (i, j, k, negate) = order.axes();
    if negate {
        euler_matrix_ijk(-x, -y, -z, i, j, k)
    } else {
        euler_matrix_ijk(x, y, z, i, j, k)
    }
}

/// Homogeneous rotation matrix of a quaternion.
///
/// The quaternion does not need to be normalized. Quaternions with a squared
/// norm below [`EPS`](constant.EPS.html) yield the identity.
pub fn quaternion_to_matrix(q: Orientation) -> Transform {
    let mut q = [q.s, q.v.x, q.v.y, q.v.z];
    let n: f64 = q.iter().map(|c| c * c).sum();
    if n < EPS {
        return Transform::identity();
    }
    let scale = (2.0 / n).sqrt();
    for c in q.iter_mut() {
        *c *= scale;
    }
    let o = |a: usize, b: usize| q[a] * q[b];
    from_rows([
        [1.0 - o(2, 2) - o(3, 3), o(1, 2) - o(3, 0), o(1, 3) + o(2, 0), 0.0],
        [o(1, 2) + o(3, 0), 1.0 - o(1, 1) - o(3, 3), o(2, 3) - o(1, 0), 0.0],
        [o(1, 3) - o(2, 0), o(2, 3) + o(1, 0), 1.0 - o(1, 1) - o(2, 2), 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ])
}

/// Rotation quaternion of a homogeneous matrix, with a non-negative `w`.
///
/// Uses the trace of the matrix, or the largest diagonal entry when the trace
/// is small. If the normalizing denominator `t * m33` drops below
/// [`EPS`](constant.EPS.html) the quaternion is taken from the eigenvector of
/// the largest eigenvalue of the symmetric matrix `K` built from the rotation
/// part instead.
pub fn quaternion_from_matrix(m: &Transform) -> Orientation {
    let at = |row: usize, col: usize| m[col][row];
    let m33 = at(3, 3);
    let mut t = at(0, 0) + at(1, 1) + at(2, 2) + m33;

    // (w, x, y, z)
    let mut q = [0.0; 4];
    if t > m33 {
        q[0] = t;
        q[3] = at(1, 0) - at(0, 1);
        q[2] = at(0, 2) - at(2, 0);
        q[1] = at(2, 1) - at(1, 2);
    } else {
        let (mut i, mut j, mut k) = (0, 1, 2);
        if at(1, 1) > at(0, 0) {
            i = 1;
            j = 2;
            k = 0;
        }
        if at(2, 2) > at(i, i) {
            i = 2;
            j = 0;
            k = 1;
        }
        t = at(i, i) - (at(j, j) + at(k, k)) + m33;
        q[i + 1] = t;
        q[j + 1] = at(i, j) + at(j, i);
        q[k + 1] = at(k, i) + at(i, k);
        q[0] = at(k, j) - at(j, k);
    }

    let denominator = t * m33;
    if denominator < EPS {
        q = quaternion_from_eigen(m);
    } else {
        let scale = 0.5 / denominator.sqrt();
        for c in q.iter_mut() {
            *c *= scale;
        }
    }

    if q[0] < 0.0 {
        for c in q.iter_mut() {
            *c = -*c;
        }
    }
    Orientation::new(q[0], q[1], q[2], q[3])
}

/// Eigen-decomposition path of `quaternion_from_matrix`, returns `(w, x, y, z)`.
fn quaternion_from_eigen(m: &Transform) -> [f64; 4] {
    let at = |row: usize, col: usize| m[col][row];
    let (m00, m01, m02) = (at(0, 0), at(0, 1), at(0, 2));
    let (m10, m11, m12) = (at(1, 0), at(1, 1), at(1, 2));
    let (m20, m21, m22) = (at(2, 0), at(2, 1), at(2, 2));

    let k = nalgebra::Matrix4::new(
        m00 - m11 - m22, m01 + m10, m02 + m20, m21 - m12,
        m01 + m10, m11 - m00 - m22, m12 + m21, m02 - m20,
        m02 + m20, m12 + m21, m22 - m00 - m11, m10 - m01,
        m21 - m12, m02 - m20, m10 - m01, m00 + m11 + m22,
    ) / 3.0;
    let eigen = k.symmetric_eigen();
    let v = eigen.eigenvectors.column(eigen.eigenvalues.imax());
    [v[3], v[0], v[1], v[2]]
}

/// Hamilton product `q1 * q0`: applies `q0` first, then `q1`.
pub fn quaternion_multiply(q1: Orientation, q0: Orientation) -> Orientation {
    q1 * q0
}

/// Spherical linear interpolation between two quaternions.
///
/// Fractions of exactly `0.0` and `1.0` return the endpoints unchanged. When
/// `shortest_path` is set and the endpoints lie in opposite hemispheres, `q1`
/// is negated first so that the shorter arc is taken.
///
/// Endpoints within [`EPS`](constant.EPS.html) of parallel return `q0`
/// unchanged. Quaternions widened from `f32` usually miss that window, so
/// `slerp(q, q, f)` then differs from `q` by rounding error.
pub fn slerp(q0: Orientation, q1: Orientation, fraction: f64, shortest_path: bool) -> Orientation {
    if fraction == 0.0 {
        return q0;
    } else if fraction == 1.0 {
        return q1;
    }

    let mut d = q0.dot(q1);
    if (d.abs() - 1.0).abs() < EPS {
        return q0;
    }

    let mut q1 = q1;
    if shortest_path && d < 0.0 {
        d = -d;
        q1 = -q1;
    }

    // half angle between the two rotations
    let angle = d.max(-1.0).min(1.0).acos();
    if angle.abs() < EPS {
        return q0;
    }

    let isin = 1.0 / angle.sin();
    q0 * (((1.0 - fraction) * angle).sin() * isin) + q1 * ((fraction * angle).sin() * isin)
}

/// Interpolates from the identity rotation toward the rotation of `m`.
pub fn slerp_from_matrix(m: &::cgmath::Matrix3<f64>, fraction: f64, shortest_path: bool) -> Orientation {
    let target = quaternion_from_matrix(&Transform::from(*m));
    slerp(Orientation::new(1.0, 0.0, 0.0, 0.0), target, fraction, shortest_path)
}

/// Rotation of `angle` radians around `axis`.
///
/// The axis is normalized here; a zero-length axis gives an undefined result.
pub fn axis_angle_matrix(angle: f64, axis: Vector) -> Transform {
    Transform::from_axis_angle(axis.normalize(), Rad(angle))
}

/// Which axis points up along the model, and which way the model faces.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize)]
pub enum ModelOrientation {
    #[serde(rename = "yUpFaceZ")]
    YUpFaceZ,
    #[serde(rename = "yUpFaceX")]
    YUpFaceX,
    #[serde(rename = "zUpFaceNegY")]
    ZUpFaceNegY,
    #[serde(rename = "zUpFaceX")]
    ZUpFaceX,
}

impl Default for ModelOrientation {
    fn default() -> Self {
        ModelOrientation::YUpFaceZ
    }
}

impl FromStr for ModelOrientation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yUpFaceZ" => Ok(ModelOrientation::YUpFaceZ),
            "yUpFaceX" => Ok(ModelOrientation::YUpFaceX),
            "zUpFaceNegY" => Ok(ModelOrientation::ZUpFaceNegY),
            "zUpFaceX" => Ok(ModelOrientation::ZUpFaceX),
            _ => Err(ParseError::Unknown("orientation", s.to_string())),
        }
    }
}

impl fmt::Display for ModelOrientation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            ModelOrientation::YUpFaceZ => "yUpFaceZ",
            ModelOrientation::YUpFaceX => "yUpFaceX",
            ModelOrientation::ZUpFaceNegY => "zUpFaceNegY",
            ModelOrientation::ZUpFaceX => "zUpFaceX",
        };
        f.write_str(name)
    }
}

impl ModelOrientation {
    /// Rotation taking the default `yUpFaceZ` space into this convention.
    pub fn matrix(self) -> Transform {
        match self {
            ModelOrientation::YUpFaceZ => Transform::identity(),
            ModelOrientation::YUpFaceX => axis_angle_matrix(FRAC_PI_2, Vector::unit_y()),
            ModelOrientation::ZUpFaceNegY => axis_angle_matrix(FRAC_PI_2, Vector::unit_x()),
            ModelOrientation::ZUpFaceX => {
                axis_angle_matrix(FRAC_PI_2, Vector::unit_z()) * axis_angle_matrix(FRAC_PI_2, Vector::unit_x())
            }
        }
    }
}

/// How the local axes of a bone are laid out around it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize)]
pub enum RotationAxis {
    /// Y along the bone, X is the bending axis.
    #[serde(rename = "y")]
    Y,
    /// X along the bone, Y is the bending axis.
    #[serde(rename = "x")]
    X,
    /// Axes of the model space; only the translation is remapped.
    #[serde(rename = "g", alias = "global")]
    Global,
}

impl Default for RotationAxis {
    fn default() -> Self {
        RotationAxis::Y
    }
}

impl FromStr for RotationAxis {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "y" => Ok(RotationAxis::Y),
            "x" => Ok(RotationAxis::X),
            "g" | "global" => Ok(RotationAxis::Global),
            _ => Err(ParseError::Unknown("rotation axis", s.to_string())),
        }
    }
}

/// Remaps a bone matrix into the chosen model orientation and axis layout.
///
/// `offset` is added to the translation before remapping.
pub fn change_orientation(
    m: &Transform,
    orientation: ModelOrientation,
    rot_axis: RotationAxis,
    offset: Vector,
) -> Transform {
    let mut mat = *m;
    mat.w += offset.extend(0.0);
    let rot = orientation.matrix();

    match rot_axis {
        RotationAxis::Y => rot * mat,
        RotationAxis::X => {
            let rotxy = axis_angle_matrix(-FRAC_PI_2, Vector::unit_x()) * axis_angle_matrix(FRAC_PI_2, Vector::unit_y());
            rot * mat * rotxy
        }
        RotationAxis::Global => {
            let mut global = Transform::identity();
            global.w = rot * mat.w;
            global
        }
    }
}

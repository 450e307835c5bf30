//! Keyframed bone rotations.
//!
//! ## Introduction
//!
//! A [`Clip`] holds one [`Track`] per animated bone. A track is a list of key
//! times and rotation values; sampling a clip at some time yields the update
//! set that [`Skeleton::pose`] takes.
//!
//! ```rust,no_run
//! # extern crate armature;
//! # fn main() {
//! use armature::animation::{Clip, Interpolation, Track, Values};
//! use armature::EulerOrder;
//!
//! # let mut skeleton: armature::Skeleton = unimplemented!();
//! # let mut skinning: Vec<armature::BoneMatrix> = Vec::new();
//! let clip = Clip {
//!     name: Some("nod".into()),
//!     tracks: vec![Track {
//!         bone: "head".into(),
//!         times: vec![0.0, 0.5, 1.0],
//!         values: Values::Euler(EulerOrder::Xyz, vec![[0.0; 3], [0.4, 0.0, 0.0], [0.0; 3]]),
//!         interpolation: Interpolation::Linear,
//!     }],
//! };
//! skeleton.pose(&clip.sample(0.25), &mut skinning);
//! # }
//! ```
//!
//! Values are held before the first and after the last key.
//!
//! [`Clip`]: struct.Clip.html
//! [`Track`]: struct.Track.html
//! [`Skeleton::pose`]: ../skeleton/struct.Skeleton.html#method.pose

use std::collections::HashMap;

use math::{euler_matrix, quaternion_from_matrix, slerp, EulerOrder};
use skeleton::RotationSource;
use Orientation;

/// Describes the interpolation behaviour between keyframes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Interpolation {
    /// Immediate change between keyframe values.
    Discrete,

    /// Spherical linear interpolation between keyframe values.
    Linear,
}

/// Position of a time within a track.
#[derive(Clone, Copy, Debug, PartialEq)]
enum FrameRef {
    /// Before the first key.
    Unstarted,

    /// Between key `i` and key `i + 1`, with the fraction of the way.
    InProgress(usize, f64),

    /// After the last key.
    Ended,
}

/// Keyframe rotations.
#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    /// Euler angles in radians with their axis sequence.
    Euler(EulerOrder, Vec<[f64; 3]>),

    /// Rotation quaternions.
    Quaternion(Vec<Orientation>),
}

impl Values {
    /// Number of keyframe values.
    pub fn len(&self) -> usize {
        match *self {
            Values::Euler(_, ref values) => values.len(),
            Values::Quaternion(ref values) => values.len(),
        }
    }

    fn quaternion(&self, index: usize) -> Orientation {
        match *self {
            Values::Euler(order, ref values) => {
                let [x, y, z] = values[index];
                quaternion_from_matrix(&euler_matrix(x, y, z, order))
            }
            Values::Quaternion(ref values) => values[index],
        }
    }
}

/// Rotation keyframes of one bone.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    /// Name of the animated bone.
    pub bone: String,

    /// Key times in seconds, ascending.
    pub times: Vec<f64>,

    /// One value per key time.
    pub values: Values,

    /// Interpolation between keys.
    pub interpolation: Interpolation,
}

impl Track {
    fn key_count(&self) -> usize {
        if self.times.len() != self.values.len() {
            warn!(
                "Track of {} has {} times and {} values",
                self.bone,
                self.times.len(),
                self.values.len()
            );
        }
        self.times.len().min(self.values.len())
    }

    fn frame_at_time(&self, t: f64, keys: usize) -> FrameRef {
        if t <= self.times[0] {
            return FrameRef::Unstarted;
        }
        if t >= self.times[keys - 1] {
            return FrameRef::Ended;
        }

        let mut i = 0;
        while t > self.times[i + 1] {
            i += 1;
        }
        let span = self.times[i + 1] - self.times[i];
        let s = if span > 0.0 { (t - self.times[i]) / span } else { 1.0 };
        FrameRef::InProgress(i, s)
    }

    /// Rotation at time `t`, or `None` for a track without keys or a NaN time.
    pub fn sample(&self, t: f64) -> Option<Orientation> {
        if t.is_nan() {
            warn!("Track of {} sampled at NaN", self.bone);
            return None;
        }
        let keys = self.key_count();
        if keys == 0 {
            return None;
        }
        let q = match self.frame_at_time(t, keys) {
            FrameRef::Unstarted => self.values.quaternion(0),
            FrameRef::Ended => self.values.quaternion(keys - 1),
            FrameRef::InProgress(i, s) => match self.interpolation {
                Interpolation::Discrete => self.values.quaternion(i),
                Interpolation::Linear => {
                    slerp(self.values.quaternion(i), self.values.quaternion(i + 1), s, true)
                }
            },
        };
        Some(q)
    }

    /// Time of the last key.
    pub fn end_time(&self) -> f64 {
        self.times[.. self.key_count()].last().cloned().unwrap_or(0.0)
    }
}

/// A named set of bone tracks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Clip {
    /// Optional clip name.
    pub name: Option<String>,

    /// One track per animated bone.
    pub tracks: Vec<Track>,
}

impl Clip {
    /// Time of the last key over all tracks.
    pub fn duration(&self) -> f64 {
        self.tracks.iter().map(Track::end_time).fold(0.0, f64::max)
    }

    /// Bone rotations at time `t`, ready for `Skeleton::pose`.
    ///
    /// Tracks without keys are left out.
    pub fn sample(&self, t: f64) -> HashMap<String, RotationSource> {
        self.tracks
            .iter()
            .filter_map(|track| {
                track
                    .sample(t)
                    .map(|q| (track.bone.clone(), RotationSource::Quaternion(q)))
            })
            .collect()
    }
}

//! Rig documents.
//!
//! A rig document is a JSON object with the following keys:
//!
//! * `joints`: joint name to a list of mesh vertex indices. The joint position
//!   is the mean of those vertices.
//! * `planes`: plane name to three joint names. Any slot may be `null`, but a
//!   bone can only use a plane whose slots are all set.
//! * `bones`: bone name to `{head, tail, parent?, rotation_plane?, reference?,
//!   weights_reference?}`. `head` and `tail` name joints, or give a literal
//!   `[x, y, z]` position.
//! * `weights_file`: optional name of the weight file, see
//!   [`DEFAULT_WEIGHTS`](constant.DEFAULT_WEIGHTS.html).
//!
//! `joints` and `bones` are required.

use serde::{Deserialize, Deserializer};
use serde_json;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use graph::StructuralError;
use util;

/// Weight file used when the rig does not name one.
pub const DEFAULT_WEIGHTS: &str = "default_weights.mhw";

quick_error! {
    #[doc = "Error encountered when loading a rig."]
    #[derive(Debug)]
    pub enum RigError {
        #[doc = "The rig is malformed."]
        Structural(err: StructuralError) {
            from()
            description("malformed rig")
            display("malformed rig: {}", err)
            cause(err)
        }

        #[doc = "A referenced resource, such as the weight file, could not be found."]
        MissingResource(name: String) {
            description("missing resource")
            display("missing resource `{}`", name)
        }

        #[doc = "Standard I/O error."]
        Io(err: io::Error) {
            from()
            description("I/O error")
            display("I/O error: {}", err)
            cause(err)
        }

        #[doc = "JSON syntax or schema error."]
        Json(err: serde_json::Error) {
            from()
            description("JSON error")
            display("JSON error: {}", err)
            cause(err)
        }

        #[doc = "Error that occurred while reading the given file."]
        InFile(path: PathBuf, err: Box<RigError>) {
            description("error in rig file")
            display("{} in {}", err, path.display())
            cause(&**err)
        }
    }
}

impl RigError {
    /// Attaches the path of the file being loaded, unless one is attached already.
    pub fn in_file<P: Into<PathBuf>>(self, path: P) -> Self {
        match self {
            RigError::InFile(..) => self,
            err => RigError::InFile(path.into(), Box::new(err)),
        }
    }

    /// The structural error behind this one, if any.
    pub fn structural(&self) -> Option<&StructuralError> {
        match *self {
            RigError::Structural(ref err) => Some(err),
            RigError::InFile(_, ref err) => err.structural(),
            _ => None,
        }
    }

    /// Whether a referenced resource was missing.
    pub fn is_missing_resource(&self) -> bool {
        match *self {
            RigError::MissingResource(_) => true,
            RigError::InFile(_, ref err) => err.is_missing_resource(),
            _ => false,
        }
    }
}

/// Reference from a bone to its head or tail position.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JointRef {
    /// Named joint from the `joints` table.
    Name(String),
    /// Literal model space position.
    Position([f64; 3]),
}

impl<'a> From<&'a str> for JointRef {
    fn from(name: &'a str) -> Self {
        JointRef::Name(name.to_string())
    }
}

impl From<[f64; 3]> for JointRef {
    fn from(position: [f64; 3]) -> Self {
        JointRef::Position(position)
    }
}

/// Accepts `null`, a name, or a list of names of which the first is kept.
fn name_or_first<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Names {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Names>::deserialize(deserializer)? {
        Some(Names::One(name)) => Some(name),
        Some(Names::Many(names)) => names.into_iter().next(),
        None => None,
    })
}

/// A single bone entry of the rig document.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct BoneDefinition {
    /// Start of the bone.
    #[serde(default)]
    pub head: Option<JointRef>,
    /// End of the bone.
    #[serde(default)]
    pub tail: Option<JointRef>,
    /// Parent bone; `None` marks the root.
    #[serde(default)]
    pub parent: Option<String>,
    /// Plane giving the bending reference of the bone.
    #[serde(default)]
    pub rotation_plane: Option<String>,
    /// Bone this one is positioned relative to.
    #[serde(default, deserialize_with = "name_or_first")]
    pub reference: Option<String>,
    /// Bone whose vertex weights this bone uses.
    #[serde(default, deserialize_with = "name_or_first")]
    pub weights_reference: Option<String>,
}

impl BoneDefinition {
    /// Creates a bone spanning `head` to `tail`.
    pub fn new<H, T>(head: H, tail: T) -> Self
    where
        H: Into<JointRef>,
        T: Into<JointRef>,
    {
        BoneDefinition {
            head: Some(head.into()),
            tail: Some(tail.into()),
            .. BoneDefinition::default()
        }
    }

    /// Sets the parent bone.
    pub fn parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    /// Sets the rotation plane.
    pub fn rotation_plane(mut self, plane: &str) -> Self {
        self.rotation_plane = Some(plane.to_string());
        self
    }
}

/// Document layout as found on disk, before the required sections are checked.
#[derive(Deserialize)]
struct RawRig {
    joints: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    planes: BTreeMap<String, serde_json::Value>,
    bones: Option<BTreeMap<String, BoneDefinition>>,
    #[serde(default)]
    weights_file: Option<String>,
}

/// The declarative description of a rig.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RigDefinition {
    /// Joint name to mesh vertex indices.
    pub joints: BTreeMap<String, Vec<u32>>,
    /// Plane name to its three joints.
    pub planes: BTreeMap<String, [Option<String>; 3]>,
    /// Bone name to its definition.
    pub bones: BTreeMap<String, BoneDefinition>,
    /// Weight file override.
    pub weights_file: Option<String>,
}

impl RigDefinition {
    /// Parses a rig document.
    ///
    /// Joint entries that are not a non-empty list of vertex indices, and
    /// plane entries that are not three joint names or nulls, are skipped.
    /// A bone using a skipped plane fails validation later.
    pub fn from_json(source: &str) -> Result<Self, RigError> {
        let raw: RawRig = serde_json::from_str(source)?;
        let joints = raw.joints
            .ok_or(StructuralError::MissingSection("joints"))?;
        let bones = raw.bones
            .ok_or(StructuralError::MissingSection("bones"))?;

        let joints = joints
            .into_iter()
            .filter_map(|(name, value)| match serde_json::from_value::<Vec<u32>>(value) {
                Ok(ref indices) if indices.is_empty() => {
                    warn!("Joint {} has no vertices, skipping", name);
                    None
                }
                Ok(indices) => Some((name, indices)),
                Err(_) => {
                    warn!("Joint {} is not a list of vertex indices, skipping", name);
                    None
                }
            })
            .collect();

        let planes = raw.planes
            .into_iter()
            .filter_map(|(name, value)| match serde_json::from_value::<[Option<String>; 3]>(value) {
                Ok(slots) => Some((name, slots)),
                Err(_) => {
                    warn!("Plane {} is not a list of three joints, skipping", name);
                    None
                }
            })
            .collect();

        Ok(RigDefinition {
            joints,
            planes,
            bones,
            weights_file: raw.weights_file,
        })
    }

    /// Reads and parses a rig file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RigError> {
        let path = path.as_ref();
        util::read_file_to_string(path)
            .map_err(RigError::from)
            .and_then(|source| RigDefinition::from_json(&source))
            .map_err(|err| err.in_file(path))
    }

    /// Name of the weight file, falling back to `default`.
    pub fn weights_name<'a>(&'a self, default: &'a str) -> &'a str {
        self.weights_file.as_ref().map_or(default, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph::{BoneGraph, StructuralError};

    #[test]
    fn parse_full_document() {
        let rig = RigDefinition::from_json(r#"{
            "joints": {"a": [0, 1], "b": [2], "c": [3], "bad": "x", "empty": []},
            "planes": {"p": ["a", "b", "c"], "half": ["a", null, "c"]},
            "bones": {
                "root": {"head": "a", "tail": "b", "parent": null},
                "arm": {"head": "b", "tail": [1.0, 2.0, 3.0], "parent": "root",
                        "rotation_plane": "p", "reference": ["root", "x"],
                        "weights_reference": "root", "roll": 0.5}
            },
            "weights_file": "custom.mhw"
        }"#).unwrap();

        assert_eq!(rig.joints.len(), 3);
        assert_eq!(rig.joints["a"], vec![0, 1]);
        assert_eq!(rig.planes["half"], [Some("a".to_string()), None, Some("c".to_string())]);
        assert_eq!(rig.bones["root"].parent, None);
        let arm = &rig.bones["arm"];
        assert_eq!(arm.tail, Some(JointRef::Position([1.0, 2.0, 3.0])));
        assert_eq!(arm.reference, Some("root".to_string()));
        assert_eq!(arm.weights_reference, Some("root".to_string()));
        assert_eq!(rig.weights_name(DEFAULT_WEIGHTS), "custom.mhw");
    }

    #[test]
    fn missing_sections_are_structural() {
        let err = RigDefinition::from_json(r#"{"bones": {}}"#).unwrap_err();
        match err.structural() {
            Some(&StructuralError::MissingSection("joints")) => {}
            other => panic!("unexpected {:?}", other),
        }
        let err = RigDefinition::from_json(r#"{"joints": {}}"#).unwrap_err();
        match err.structural() {
            Some(&StructuralError::MissingSection("bones")) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_planes_are_skipped() {
        let rig = RigDefinition::from_json(r#"{
            "joints": {"a": [0], "b": [1]},
            "planes": {"short": ["a", "b"], "odd": 7, "ok": ["a", "b", null]},
            "bones": {"root": {"head": "a", "tail": "b"}}
        }"#).unwrap();
        assert_eq!(rig.planes.keys().collect::<Vec<_>>(), vec!["ok"]);
        assert!(BoneGraph::build(&rig).is_ok());
    }

    #[test]
    fn bone_on_malformed_plane_names_it() {
        let rig = RigDefinition::from_json(r#"{
            "joints": {"a": [0], "b": [1]},
            "planes": {"short": ["a", "b"]},
            "bones": {"root": {"head": "a", "tail": "b", "rotation_plane": "short"}}
        }"#).unwrap();
        assert_eq!(
            BoneGraph::build(&rig).unwrap_err(),
            StructuralError::UndefinedPlane { bone: "root".into(), plane: "short".into() }
        );
    }

    #[test]
    fn default_weights_name() {
        let rig = RigDefinition::from_json(r#"{"joints": {}, "bones": {}}"#).unwrap();
        assert_eq!(rig.weights_name(DEFAULT_WEIGHTS), DEFAULT_WEIGHTS);
    }

    #[test]
    fn load_reports_path() {
        let err = RigDefinition::load("/nonexistent/rig.json").unwrap_err();
        match err {
            RigError::InFile(ref path, ref inner) => {
                assert_eq!(path, Path::new("/nonexistent/rig.json"));
                match **inner {
                    RigError::Io(_) => {}
                    ref other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn builder_sets_fields() {
        let bone = BoneDefinition::new("a", [0.0, 1.0, 0.0]).parent("hip").rotation_plane("p");
        assert_eq!(bone.head, Some(JointRef::Name("a".to_string())));
        assert_eq!(bone.parent, Some("hip".to_string()));
        assert_eq!(bone.rotation_plane, Some("p".to_string()));
    }
}

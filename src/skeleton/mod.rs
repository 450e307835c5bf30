//! Skeletons bound to a mesh.
//!
//! A [`Skeleton`] is built once from a rig when a character's base mesh is
//! loaded. Its rest matrices are computed right away from the joint positions
//! of the mesh, and again through [`Skeleton::reshape`] whenever the vertices
//! defining the joints move. Pose matrices are recomputed on every
//! [`Skeleton::pose`] call.
//!
//! A skeleton is owned by exactly one character and is not shared.
//!
//! [`Skeleton`]: struct.Skeleton.html
//! [`Skeleton::reshape`]: struct.Skeleton.html#method.reshape
//! [`Skeleton::pose`]: struct.Skeleton.html#method.pose

mod pose;
mod rest;

pub use self::pose::{BoneMatrix, RotationSource};
pub use self::rest::rest_frame;

use cgmath::{SquareMatrix, Vector4};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use graph::{BoneGraph, BoneNode, StructuralError};
use math::{ModelOrientation, RotationAxis};
use mesh::JointPositions;
use rig::{RigDefinition, RigError, DEFAULT_WEIGHTS};
use weights::{self, DataLocator, WeightTable};
use {Position, Transform, Vector};

/// Settings applied when computing rest matrices.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RigOptions {
    /// Up and facing convention of the target space.
    pub orientation: ModelOrientation,
    /// Layout of the local bone axes.
    pub rot_axis: RotationAxis,
    /// Added to every bone translation.
    pub offset: [f64; 3],
    /// Weight file used when the rig does not name one.
    pub default_weights: String,
}

impl Default for RigOptions {
    fn default() -> Self {
        RigOptions {
            orientation: ModelOrientation::default(),
            rot_axis: RotationAxis::default(),
            offset: [0.0; 3],
            default_weights: DEFAULT_WEIGHTS.to_string(),
        }
    }
}

impl RigOptions {
    /// The translation offset as a vector.
    pub fn offset(&self) -> Vector {
        Vector::from(self.offset)
    }
}

/// Whether a bone carries an applied pose.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PoseState {
    /// Only the bind pose is applied.
    Rest,
    /// The local and global matrices reflect an applied rotation.
    Posed,
}

/// A bone and its transform state.
#[derive(Clone, Debug)]
pub struct Bone {
    name: String,
    parent: Option<usize>,
    head: Position,
    tail: Position,
    tail_local: Vector4<f64>,
    rest: Transform,
    rest_inverse: Transform,
    rest_local: Transform,
    local: Transform,
    global: Transform,
    state: PoseState,
}

impl Bone {
    fn new(node: &BoneNode) -> Self {
        Bone {
            name: node.name.clone(),
            parent: node.parent_index,
            head: Position::new(0.0, 0.0, 0.0),
            tail: Position::new(0.0, 0.0, 0.0),
            tail_local: Vector4::new(0.0, 0.0, 0.0, 1.0),
            rest: Transform::identity(),
            rest_inverse: Transform::identity(),
            rest_local: Transform::identity(),
            local: Transform::identity(),
            global: Transform::identity(),
            state: PoseState::Rest,
        }
    }

    /// Bone name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the parent bone.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Head position taken from the mesh at the last rest computation.
    pub fn head(&self) -> Position {
        self.head
    }

    /// Tail position taken from the mesh at the last rest computation.
    pub fn tail(&self) -> Position {
        self.tail
    }

    /// Bind pose matrix in model space.
    pub fn rest_matrix(&self) -> &Transform {
        &self.rest
    }

    /// Bind pose matrix relative to the parent's bind pose.
    pub fn rest_local_matrix(&self) -> &Transform {
        &self.rest_local
    }

    /// Posed matrix relative to the parent.
    pub fn local_pose_matrix(&self) -> &Transform {
        &self.local
    }

    /// Posed matrix in model space.
    pub fn global_pose_matrix(&self) -> &Transform {
        &self.global
    }

    /// Maps bind pose positions to posed positions.
    pub fn skinning_matrix(&self) -> Transform {
        self.global * self.rest_inverse
    }

    /// Current pose state.
    pub fn state(&self) -> PoseState {
        self.state
    }
}

/// A validated bone hierarchy with rest and pose matrices.
#[derive(Clone, Debug)]
pub struct Skeleton {
    name: String,
    joints: BTreeMap<String, Vec<u32>>,
    planes: BTreeMap<String, [Option<String>; 3]>,
    graph: BoneGraph,
    bones: Vec<Bone>,
    weights: WeightTable,
    options: RigOptions,
}

impl Skeleton {
    /// Builds a skeleton from a rig definition and computes its rest pose.
    ///
    /// `weights` is keyed by bone name; it is re-keyed to honour the
    /// `weights_reference` of each bone.
    pub fn new<M>(
        name: &str,
        definition: RigDefinition,
        mesh: &M,
        weights: WeightTable,
        options: RigOptions,
    ) -> Result<Self, StructuralError>
    where
        M: JointPositions + ?Sized,
    {
        let graph = BoneGraph::build(&definition)?;
        Ok(Skeleton::with_graph(name, definition, graph, mesh, &weights, options))
    }

    fn with_graph<M>(
        name: &str,
        definition: RigDefinition,
        graph: BoneGraph,
        mesh: &M,
        weights: &WeightTable,
        options: RigOptions,
    ) -> Self
    where
        M: JointPositions + ?Sized,
    {
        let bones = graph.bones().iter().map(Bone::new).collect();
        let weights = weights.remap(&graph);
        let mut skeleton = Skeleton {
            name: name.to_string(),
            joints: definition.joints,
            planes: definition.planes,
            graph,
            bones,
            weights,
            options,
        };
        skeleton.calc_rest_matrices(mesh);
        info!(
            "Skeleton {}: {} bones, root {}",
            skeleton.name,
            skeleton.bones.len(),
            skeleton.graph.root().name
        );
        skeleton
    }

    /// Validates a rig definition, resolves and loads its weight file, and
    /// computes the rest pose.
    ///
    /// `base` is the base mesh name the weight file is looked up for.
    pub fn from_definition<M, L>(
        name: &str,
        base: &str,
        definition: RigDefinition,
        mesh: &M,
        locator: &L,
        options: RigOptions,
    ) -> Result<Self, RigError>
    where
        M: JointPositions + ?Sized,
        L: DataLocator + ?Sized,
    {
        let graph = BoneGraph::build(&definition)?;
        let weights = {
            let weights_name = definition.weights_name(&options.default_weights);
            let path = weights::resolve(locator, base, weights_name)?;
            WeightTable::load(&path)?
        };
        Ok(Skeleton::with_graph(name, definition, graph, mesh, &weights, options))
    }

    /// Loads a rig file.
    ///
    /// The skeleton is named after the file stem. Failures are logged with
    /// the offending path and returned; the caller decides whether to fall
    /// back to an unrigged mesh.
    pub fn load<P, M, L>(
        base: &str,
        path: P,
        mesh: &M,
        locator: &L,
        options: RigOptions,
    ) -> Result<Self, RigError>
    where
        P: AsRef<Path>,
        M: JointPositions + ?Sized,
        L: DataLocator + ?Sized,
    {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let result = RigDefinition::load(path).and_then(|definition| {
            Skeleton::from_definition(&name, base, definition, mesh, locator, options)
                .map_err(|err| err.in_file(path))
        });
        if let Err(ref err) = result {
            error!("Unable to load skeleton: {}", err);
        }
        result
    }

    /// Skeleton name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The validated hierarchy.
    pub fn graph(&self) -> &BoneGraph {
        &self.graph
    }

    /// Bones in topological order.
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Looks a bone up by name.
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.graph.index_of(name).map(|i| &self.bones[i])
    }

    /// The root bone.
    pub fn root(&self) -> &Bone {
        &self.bones[0]
    }

    /// Per bone vertex influences.
    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Rest computation settings.
    pub fn options(&self) -> &RigOptions {
        &self.options
    }

    /// Joint name to mesh vertex indices.
    pub fn joints(&self) -> &BTreeMap<String, Vec<u32>> {
        &self.joints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig::BoneDefinition;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile;

    fn rig_json() -> &'static str {
        r#"{
            "joints": {"ground": [0], "pelvis": [1], "neck": [2]},
            "bones": {
                "hip": {"head": "ground", "tail": "pelvis"},
                "spine": {"head": "pelvis", "tail": "neck", "parent": "hip"}
            },
            "weights_file": "body.mhw"
        }"#
    }

    fn vertices() -> Vec<Position> {
        vec![
            Position::new(0.0, 0.0, 0.0),
            Position::new(0.0, 1.0, 0.0),
            Position::new(0.0, 2.0, 0.0),
        ]
    }

    #[test]
    fn new_builds_bones_in_order() {
        let mut definition = RigDefinition::default();
        definition.bones.insert(
            "spine".into(),
            BoneDefinition::new([0.0, 1.0, 0.0], [0.0, 2.0, 0.0]).parent("hip"),
        );
        definition.bones.insert("hip".into(), BoneDefinition::new([0.0; 3], [0.0, 1.0, 0.0]));
        let mesh: Vec<Position> = Vec::new();
        let skeleton = Skeleton::new("test", definition, &mesh[..], WeightTable::default(), RigOptions::default())
            .unwrap();
        assert_eq!(skeleton.root().name(), "hip");
        assert_eq!(skeleton.bone("spine").unwrap().parent(), Some(0));
        assert_eq!(skeleton.weights().len(), 2);
        assert!(skeleton.bones().iter().all(|b| b.state() == PoseState::Rest));
    }

    #[test]
    fn load_resolves_weights() {
        let dir = tempfile::tempdir().unwrap();
        let rig_path = dir.path().join("basic.rig");
        File::create(&rig_path).unwrap().write_all(rig_json().as_bytes()).unwrap();
        fs::create_dir_all(dir.path().join("rigs").join("hm08")).unwrap();
        File::create(dir.path().join("rigs").join("hm08").join("body.mhw"))
            .unwrap()
            .write_all(br#"{"weights": {"hip": [[0, 1.0]], "spine": [[1, 1.0], [2, 1.0]]}}"#)
            .unwrap();

        let data = ::weights::DataDirs::new(vec![dir.path().to_path_buf()]);
        let skeleton = Skeleton::load("hm08", &rig_path, &vertices()[..], &data, RigOptions::default())
            .unwrap();
        assert_eq!(skeleton.name(), "basic");
        assert_eq!(skeleton.weights().bone("spine").len(), 2);
        assert!(skeleton.weights().path().is_some());
    }

    #[test]
    fn load_without_weights_is_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        let rig_path = dir.path().join("basic.rig");
        File::create(&rig_path).unwrap().write_all(rig_json().as_bytes()).unwrap();

        let data = ::weights::DataDirs::new(vec![dir.path().to_path_buf()]);
        let err = Skeleton::load("hm08", &rig_path, &vertices()[..], &data, RigOptions::default())
            .unwrap_err();
        assert!(err.is_missing_resource());
        match err {
            RigError::InFile(ref path, _) => assert_eq!(path, &rig_path),
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn structural_errors_come_before_weight_lookup() {
        let mut definition = RigDefinition::default();
        definition.bones.insert("a".into(), BoneDefinition::new([0.0; 3], [0.0, 1.0, 0.0]));
        definition.bones.insert("b".into(), BoneDefinition::new([0.0; 3], [1.0, 0.0, 0.0]));
        let locator = |_: &str, _: &str, _: &str| -> Option<::std::path::PathBuf> { None };
        let err = Skeleton::from_definition(
            "x", "hm08", definition, &vertices()[..], &locator, RigOptions::default(),
        ).unwrap_err();
        assert_eq!(
            err.structural(),
            Some(&StructuralError::DuplicateRoot { first: "a".into(), second: "b".into() })
        );
    }

    #[test]
    fn options_deserialize_with_defaults() {
        use serde_json;
        let options: RigOptions = serde_json::from_str(r#"{"orientation": "zUpFaceX", "rot_axis": "x"}"#).unwrap();
        assert_eq!(options.orientation, ModelOrientation::ZUpFaceX);
        assert_eq!(options.rot_axis, RotationAxis::X);
        assert_eq!(options.default_weights, DEFAULT_WEIGHTS);
        assert_eq!(options.offset(), Vector::new(0.0, 0.0, 0.0));
    }
}

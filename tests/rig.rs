extern crate armature;
extern crate cgmath;
extern crate env_logger;
extern crate rand;
#[macro_use]
extern crate serde_json;
extern crate tempfile;

use armature::math::{quaternion_from_matrix, quaternion_multiply, quaternion_to_matrix};
use armature::{
    BoneMatrix, DataDirs, Orientation, Position, RigDefinition, RigError, RigOptions,
    RotationSource, Skeleton, StructuralError, WeightTable,
};
use cgmath::{InnerSpace, Quaternion};
use rand::Rng;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn definition(value: serde_json::Value) -> Result<RigDefinition, RigError> {
    RigDefinition::from_json(&value.to_string())
}

fn build(value: serde_json::Value) -> Result<Skeleton, RigError> {
    let mesh: Vec<Position> = Vec::new();
    let definition = definition(value)?;
    let skeleton = Skeleton::new("test", definition, &mesh[..], WeightTable::default(), RigOptions::default())?;
    Ok(skeleton)
}

fn random_quaternion<R: Rng>(rng: &mut R) -> Orientation {
    loop {
        let q = Quaternion::new(
            rng.gen_range(-1.0 .. 1.0),
            rng.gen_range(-1.0 .. 1.0),
            rng.gen_range(-1.0 .. 1.0),
            rng.gen_range(-1.0 .. 1.0),
        );
        if q.magnitude2() > 1e-3 {
            return q.normalize();
        }
    }
}

#[test]
fn quaternions_survive_matrix_round_trip() {
    let mut rng = rand::thread_rng();
    for _ in 0 .. 500 {
        let q = random_quaternion(&mut rng);
        let back = quaternion_from_matrix(&quaternion_to_matrix(q));
        assert!(
            (back - q).magnitude() < 1e-8 || (back + q).magnitude() < 1e-8,
            "{:?} came back as {:?}",
            q,
            back
        );
        assert!(back.s >= 0.0);
    }
}

#[test]
fn matrix_product_matches_quaternion_product() {
    let mut rng = rand::thread_rng();
    for _ in 0 .. 100 {
        let q0 = random_quaternion(&mut rng);
        let q1 = random_quaternion(&mut rng);
        let by_matrix = quaternion_to_matrix(q1) * quaternion_to_matrix(q0);
        let by_quaternion = quaternion_to_matrix(quaternion_multiply(q1, q0));
        for col in 0 .. 4 {
            assert!((by_matrix[col] - by_quaternion[col]).magnitude() < 1e-9);
        }
    }
}

#[test]
fn inline_joints_build_a_chain() {
    init_logging();
    let skeleton = build(json!({
        "joints": {},
        "bones": {
            "hip": {"head": [0, 0, 0], "tail": [0, 1, 0]},
            "spine": {"head": [0, 1, 0], "tail": [0, 2, 0], "parent": "hip"}
        }
    })).unwrap();
    assert_eq!(skeleton.graph().order(), vec!["hip", "spine"]);
    assert_eq!(skeleton.root().name(), "hip");
    let translation = skeleton.bone("spine").unwrap().rest_matrix().w;
    assert!((translation.truncate() - cgmath::Vector3::new(0.0, 1.0, 0.0)).magnitude() < 1e-12);
}

#[test]
fn structural_errors_name_the_bone() {
    init_logging();
    let duplicate = build(json!({
        "joints": {"a": [0], "b": [1]},
        "bones": {
            "left": {"head": "a", "tail": "b"},
            "right": {"head": "b", "tail": "a"}
        }
    })).unwrap_err();
    assert_eq!(
        duplicate.structural(),
        Some(&StructuralError::DuplicateRoot { first: "left".into(), second: "right".into() })
    );

    let cyclic = build(json!({
        "joints": {"a": [0], "b": [1]},
        "bones": {
            "root": {"head": "a", "tail": "b"},
            "ping": {"head": "a", "tail": "b", "parent": "pong"},
            "pong": {"head": "b", "tail": "a", "parent": "ping"}
        }
    })).unwrap_err();
    match cyclic.structural() {
        Some(&StructuralError::CyclicParent(ref bones)) => {
            assert_eq!(bones, &vec!["ping".to_string(), "pong".to_string()])
        }
        other => panic!("unexpected {:?}", other),
    }

    let plane = build(json!({
        "joints": {"a": [0], "b": [1]},
        "planes": {"bend": ["a", null, "b"]},
        "bones": {"root": {"head": "a", "tail": "b", "rotation_plane": "bend"}}
    })).unwrap_err();
    assert_eq!(
        plane.structural(),
        Some(&StructuralError::InvalidPlane { bone: "root".into(), plane: "bend".into() })
    );

    let no_root = build(json!({
        "joints": {"a": [0], "b": [1]},
        "bones": {"only": {"head": "a", "tail": "b", "parent": "only"}}
    })).unwrap_err();
    assert_eq!(no_root.structural(), Some(&StructuralError::MissingRoot));

    let no_bones = definition(json!({"joints": {}})).unwrap_err();
    assert_eq!(no_bones.structural(), Some(&StructuralError::MissingSection("bones")));
}

#[test]
fn load_pose_and_reshape() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let rig_path = dir.path().join("arm.rig");
    let rig = json!({
        "joints": {"shoulder": [0, 1], "elbow": [2], "wrist": [3], "hand": [4]},
        "planes": {"arm": ["shoulder", "elbow", "wrist"]},
        "bones": {
            "upperarm": {"head": "shoulder", "tail": "elbow"},
            "lowerarm": {
                "head": "elbow", "tail": "wrist", "parent": "upperarm",
                "rotation_plane": "arm", "weights_reference": "forearm"
            },
            "hand": {"head": "wrist", "tail": "hand", "parent": "lowerarm"}
        }
    });
    File::create(&rig_path).unwrap().write_all(rig.to_string().as_bytes()).unwrap();
    fs::create_dir_all(dir.path().join("rigs")).unwrap();
    let weights = json!({
        "name": "arm",
        "version": 110,
        "weights": {"upperarm": [[0, 1.0], [1, 1.0]], "forearm": [[2, 0.5], [3, 1.0]], "hand": [[4, 1.0]]}
    });
    File::create(dir.path().join("rigs").join("default_weights.mhw"))
        .unwrap()
        .write_all(weights.to_string().as_bytes())
        .unwrap();

    let mut vertices = vec![
        Position::new(0.0, 0.0, 0.1),
        Position::new(0.0, 0.0, -0.1),
        Position::new(1.0, 0.0, 0.0),
        Position::new(2.0, 0.2, 0.0),
        Position::new(2.5, 0.2, 0.0),
    ];
    let data = DataDirs::new(vec![dir.path().to_path_buf()]);
    let mut skeleton = Skeleton::load("default", &rig_path, &vertices[..], &data, RigOptions::default()).unwrap();
    assert_eq!(skeleton.name(), "arm");
    assert_eq!(skeleton.weights().bone("lowerarm"), &[(2u32, 0.5f32), (3, 1.0)][..]);

    let mut frames: Vec<BoneMatrix> = Vec::new();
    let mut updates = HashMap::new();
    for bone in &["upperarm", "lowerarm", "hand"] {
        updates.insert(bone.to_string(), RotationSource::euler(0.0, 0.0, 0.4));
    }
    skeleton.pose(&updates, &mut frames);
    assert_eq!(frames.len(), 3);
    let posed_tip = skeleton.bone_segments()[2].1;
    assert!((posed_tip - Position::new(2.5, 0.2, 0.0)).magnitude() > 0.1);

    skeleton.pose(&updates, &mut frames);
    assert!((skeleton.bone_segments()[2].1 - posed_tip).magnitude() < 1e-12);

    for v in vertices.iter_mut() {
        v.y += 1.0;
    }
    skeleton.reshape(&vertices[..]);
    let segments = skeleton.bone_segments();
    assert!((segments[0].0 - Position::new(0.0, 1.0, 0.0)).magnitude() < 1e-9);
    assert!((segments[2].1 - Position::new(2.5, 1.2, 0.0)).magnitude() < 1e-9);
}

#[test]
fn missing_weights_are_reported_with_the_rig_path() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let rig_path = dir.path().join("bare.rig");
    let rig = json!({
        "joints": {"a": [0], "b": [1]},
        "bones": {"root": {"head": "a", "tail": "b"}},
        "weights_file": "bare.mhw"
    });
    File::create(&rig_path).unwrap().write_all(rig.to_string().as_bytes()).unwrap();

    let vertices = vec![Position::new(0.0, 0.0, 0.0), Position::new(0.0, 1.0, 0.0)];
    let data = DataDirs::new(vec![dir.path().to_path_buf()]);
    let err = Skeleton::load("default", &rig_path, &vertices[..], &data, RigOptions::default()).unwrap_err();
    assert!(err.is_missing_resource());
    assert!(err.to_string().contains("bare.mhw"));
}

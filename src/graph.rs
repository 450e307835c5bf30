//! Validated bone hierarchy.
//!
//! Bones reference each other by name. After validation they are stored in a
//! flat array in topological order, so a parent always precedes its children,
//! and parents are additionally resolved to indices into that array.

use itertools::Itertools;
use std::collections::{HashMap, HashSet};

use rig::{BoneDefinition, JointRef, RigDefinition};

quick_error! {
    #[doc = "A rig whose structure is malformed."]
    #[derive(Clone, Debug, PartialEq)]
    pub enum StructuralError {
        #[doc = "A required top level section is absent from the document."]
        MissingSection(section: &'static str) {
            description("missing rig section")
            display("`{}` section is missing", section)
        }

        #[doc = "A bone has no head."]
        MissingHead(bone: String) {
            description("missing bone head")
            display("head is missing for {}", bone)
        }

        #[doc = "A bone has no tail."]
        MissingTail(bone: String) {
            description("missing bone tail")
            display("tail is missing for {}", bone)
        }

        #[doc = "A bone names a joint that is not defined."]
        UndefinedJoint { bone: String, joint: String } {
            description("undefined joint")
            display("joint {} of bone {} is not defined", joint, bone)
        }

        #[doc = "A bone names a rotation plane that is not defined."]
        UndefinedPlane { bone: String, plane: String } {
            description("undefined rotation plane")
            display("rotation plane {} of bone {} is missing", plane, bone)
        }

        #[doc = "A rotation plane has a null or undefined joint slot."]
        InvalidPlane { bone: String, plane: String } {
            description("invalid rotation plane")
            display("invalid rotation plane {} of bone {}", plane, bone)
        }

        #[doc = "A bone names a parent that is not defined."]
        MissingParent { bone: String, parent: String } {
            description("missing parent bone")
            display("parent bone of {}: {} is missing", bone, parent)
        }

        #[doc = "No bone is without a parent."]
        MissingRoot {
            description("missing root bone")
            display("missing root bone (bone without parent)")
        }

        #[doc = "More than one bone is without a parent."]
        DuplicateRoot { first: String, second: String } {
            description("duplicate root bone")
            display("only one root accepted, found: {}, {}", first, second)
        }

        #[doc = "Bones whose parent chain never reaches the root."]
        CyclicParent(bones: Vec<String>) {
            description("cyclic parent chain")
            display("bones not connected to the root: {}", bones.iter().join(", "))
        }
    }
}

/// A validated bone of the hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct BoneNode {
    /// Bone name.
    pub name: String,
    /// Start of the bone.
    pub head: JointRef,
    /// End of the bone.
    pub tail: JointRef,
    /// Parent bone name, `None` for the root.
    pub parent: Option<String>,
    /// Index of the parent in [`BoneGraph::bones`](struct.BoneGraph.html#method.bones).
    pub parent_index: Option<usize>,
    /// Plane giving the bending reference.
    pub rotation_plane: Option<String>,
    /// Reference bone.
    pub reference: Option<String>,
    /// Bone whose weights are used for this one.
    pub weights_reference: Option<String>,
}

/// The validated, topologically ordered bone hierarchy.
#[derive(Clone, Debug)]
pub struct BoneGraph {
    bones: Vec<BoneNode>,
    index: HashMap<String, usize>,
}

fn check_joint(
    definition: &RigDefinition,
    bone: &str,
    joint: &Option<JointRef>,
) -> Result<(), StructuralError> {
    match *joint {
        Some(JointRef::Name(ref name)) if !definition.joints.contains_key(name) => {
            Err(StructuralError::UndefinedJoint {
                bone: bone.to_string(),
                joint: name.clone(),
            })
        }
        _ => Ok(()),
    }
}

fn check_bone(
    definition: &RigDefinition,
    name: &str,
    bone: &BoneDefinition,
) -> Result<(), StructuralError> {
    if bone.head.is_none() {
        return Err(StructuralError::MissingHead(name.to_string()));
    }
    if bone.tail.is_none() {
        return Err(StructuralError::MissingTail(name.to_string()));
    }
    check_joint(definition, name, &bone.head)?;
    check_joint(definition, name, &bone.tail)?;

    if let Some(ref plane) = bone.rotation_plane {
        let slots = definition.planes.get(plane).ok_or_else(|| StructuralError::UndefinedPlane {
            bone: name.to_string(),
            plane: plane.clone(),
        })?;
        let valid = slots.iter().all(|slot| match *slot {
            Some(ref joint) => definition.joints.contains_key(joint),
            None => false,
        });
        if !valid {
            return Err(StructuralError::InvalidPlane {
                bone: name.to_string(),
                plane: plane.clone(),
            });
        }
    }

    if let Some(ref parent) = bone.parent {
        if !definition.bones.contains_key(parent) {
            return Err(StructuralError::MissingParent {
                bone: name.to_string(),
                parent: parent.clone(),
            });
        }
    }
    Ok(())
}

impl BoneGraph {
    /// Validates a rig definition and orders its bones.
    ///
    /// Fails on the first missing head or tail, undefined joint, undefined or
    /// incomplete rotation plane, undefined parent, or when the number of
    /// bones without a parent is not exactly one. Bones whose parent chain
    /// does not lead to the root fail with
    /// [`StructuralError::CyclicParent`](enum.StructuralError.html).
    pub fn build(definition: &RigDefinition) -> Result<Self, StructuralError> {
        let mut root: Option<&str> = None;
        for (name, bone) in &definition.bones {
            check_bone(definition, name, bone)?;
            if bone.parent.is_none() {
                if let Some(first) = root {
                    return Err(StructuralError::DuplicateRoot {
                        first: first.to_string(),
                        second: name.clone(),
                    });
                }
                root = Some(name);
            }
        }
        let root = root.ok_or(StructuralError::MissingRoot)?;

        // Fixed point: each pass appends every unplaced bone whose parent is placed.
        let count = definition.bones.len();
        let mut order = vec![root];
        let mut placed: HashSet<&str> = order.iter().cloned().collect();
        for _ in 0 .. count {
            if order.len() == count {
                break;
            }
            for (name, bone) in &definition.bones {
                if placed.contains(name.as_str()) {
                    continue;
                }
                if let Some(ref parent) = bone.parent {
                    if placed.contains(parent.as_str()) {
                        placed.insert(name);
                        order.push(name);
                    }
                }
            }
        }
        if order.len() < count {
            let stray = definition.bones
                .keys()
                .filter(|name| !placed.contains(name.as_str()))
                .cloned()
                .collect();
            return Err(StructuralError::CyclicParent(stray));
        }

        let index: HashMap<String, usize> = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        let bones = order
            .iter()
            .map(|name| {
                let bone = &definition.bones[*name];
                BoneNode {
                    name: name.to_string(),
                    head: bone.head.clone().unwrap_or(JointRef::Position([0.0; 3])),
                    tail: bone.tail.clone().unwrap_or(JointRef::Position([0.0; 3])),
                    parent: bone.parent.clone(),
                    parent_index: bone.parent.as_ref().map(|p| index[p]),
                    rotation_plane: bone.rotation_plane.clone(),
                    reference: bone.reference.clone(),
                    weights_reference: bone.weights_reference.clone(),
                }
            })
            .collect();

        Ok(BoneGraph { bones, index })
    }

    /// Bones in topological order.
    pub fn bones(&self) -> &[BoneNode] {
        &self.bones
    }

    /// The root bone, always first in the order.
    pub fn root(&self) -> &BoneNode {
        &self.bones[0]
    }

    /// Number of bones.
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// Index of the named bone in the topological order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).cloned()
    }

    /// Looks a bone up by name.
    pub fn get(&self, name: &str) -> Option<&BoneNode> {
        self.index_of(name).map(|i| &self.bones[i])
    }

    /// Bone names in topological order.
    pub fn order(&self) -> Vec<&str> {
        self.bones.iter().map(|bone| bone.name.as_str()).collect()
    }

    /// Indices of the direct children of a bone.
    pub fn children(&self, index: usize) -> Vec<usize> {
        self.bones
            .iter()
            .enumerate()
            .filter(|&(_, bone)| bone.parent_index == Some(index))
            .map(|(i, _)| i)
            .collect()
    }
}

//! Vertex weights and data file lookup.

use serde::Deserialize;
use serde_json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use graph::BoneGraph;
use rig::RigError;
use util;

/// Looks up data files by category, e.g. `"rigs"`.
pub trait DataLocator {
    /// Absolute path of the named file, or `None` if it does not exist.
    ///
    /// `base` is the name of the base mesh the file belongs to.
    fn locate(&self, category: &str, base: &str, name: &str) -> Option<PathBuf>;
}

impl<F> DataLocator for F
where
    F: Fn(&str, &str, &str) -> Option<PathBuf>,
{
    fn locate(&self, category: &str, base: &str, name: &str) -> Option<PathBuf> {
        self(category, base, name)
    }
}

/// Ordered list of data directories, searched first to last.
///
/// A file is looked for at `<root>/<category>/<base>/<name>`, then at
/// `<root>/<category>/<name>`.
#[derive(Clone, Debug, Default)]
pub struct DataDirs {
    roots: Vec<PathBuf>,
}

impl DataDirs {
    /// Creates a lookup over the given roots, highest priority first.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        DataDirs { roots }
    }

    /// Appends a root with the lowest priority.
    pub fn push<P: Into<PathBuf>>(&mut self, root: P) {
        self.roots.push(root.into());
    }

    /// Search roots, highest priority first.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl DataLocator for DataDirs {
    fn locate(&self, category: &str, base: &str, name: &str) -> Option<PathBuf> {
        self.roots
            .iter()
            .flat_map(|root| {
                let dir = root.join(category);
                vec![dir.join(base).join(name), dir.join(name)]
            })
            .find(|candidate| candidate.is_file())
            .and_then(|found| fs::canonicalize(&found).ok())
    }
}

/// Resolves a rig data file or fails with `RigError::MissingResource`.
pub fn resolve<L: DataLocator + ?Sized>(locator: &L, base: &str, name: &str) -> Result<PathBuf, RigError> {
    match locator.locate("rigs", base, name) {
        Some(path) => {
            debug!("Resolved {} to {}", name, path.display());
            Ok(path)
        }
        None => Err(RigError::MissingResource(name.to_string())),
    }
}

#[derive(Deserialize)]
struct WeightFile {
    weights: BTreeMap<String, Vec<(u32, f32)>>,
}

/// Per bone `(vertex, weight)` influences.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightTable {
    path: Option<PathBuf>,
    bones: BTreeMap<String, Vec<(u32, f32)>>,
}

impl WeightTable {
    /// Creates a table from in-memory influences.
    pub fn new(bones: BTreeMap<String, Vec<(u32, f32)>>) -> Self {
        WeightTable { path: None, bones }
    }

    /// Parses a weight document: `{"weights": {bone: [[vertex, weight], ...]}}`.
    pub fn from_json(source: &str) -> Result<Self, RigError> {
        let file: WeightFile = serde_json::from_str(source)?;
        Ok(WeightTable::new(file.weights))
    }

    /// Reads a weight file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RigError> {
        let path = path.as_ref();
        let source = util::read_file_to_string(path).map_err(|err| RigError::from(err).in_file(path))?;
        let mut table = WeightTable::from_json(&source).map_err(|err| err.in_file(path))?;
        table.path = Some(path.to_path_buf());
        info!("Loaded weights for {} bones from {}", table.bones.len(), path.display());
        Ok(table)
    }

    /// Re-keys the influences by the bones of `graph`.
    ///
    /// A bone with a `weights_reference` takes the influences of the
    /// referenced name, others take their own. Bones without influences get an
    /// empty list.
    pub fn remap(&self, graph: &BoneGraph) -> WeightTable {
        let bones = graph
            .bones()
            .iter()
            .map(|bone| {
                let source = bone.weights_reference.as_ref().unwrap_or(&bone.name);
                let influences = match self.bones.get(source) {
                    Some(influences) => influences.clone(),
                    None => {
                        debug!("No weights for bone {} (looked up as {})", bone.name, source);
                        Vec::new()
                    }
                };
                (bone.name.clone(), influences)
            })
            .collect();
        WeightTable {
            path: self.path.clone(),
            bones,
        }
    }

    /// File the table was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref().map(PathBuf::as_path)
    }

    /// Influences of a bone, empty when it has none.
    pub fn bone(&self, name: &str) -> &[(u32, f32)] {
        self.bones.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over bones and their influences.
    pub fn iter(&self) -> ::std::collections::btree_map::Iter<String, Vec<(u32, f32)>> {
        self.bones.iter()
    }

    /// Number of bones in the table.
    pub fn len(&self) -> usize {
        self.bones.len()
    }
}

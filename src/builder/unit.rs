//! Translation units and their on-disk layout.
//!
//! Each source of a compiled target maps to
//! `<build-dir>/obj/<relpath>/<stem>.o` and `<build-dir>/dep/<relpath>/<stem>.d`,
//! where `relpath` is the source's directory relative to the target root,
//! minus a leading `src` when the target has a `src` directory.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::core::target::TargetDescriptor;
use crate::util::fs::relative_path;

/// Build state of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationUnit {
    pub source: PathBuf,
    pub object: PathBuf,
    pub depfile: PathBuf,
    /// Needs compiling in this build
    pub stale: bool,
    /// Compiled successfully in this build
    #[serde(skip)]
    pub compiled: bool,
    /// Diagnostics of a failed depfile generation or compile
    #[serde(skip)]
    pub failure: Option<String>,
}

impl TranslationUnit {
    pub fn new(source: PathBuf, object: PathBuf, depfile: PathBuf) -> Self {
        TranslationUnit {
            source,
            object,
            depfile,
            stale: true,
            compiled: false,
            failure: None,
        }
    }
}

/// Create the units of `target`, one per source, in source order.
pub fn units_for(target: &TargetDescriptor) -> Vec<TranslationUnit> {
    if !target.kind.is_compiled() {
        return Vec::new();
    }
    let strip_src = target.has_src_dir();
    target
        .sources
        .iter()
        .map(|source| {
            let (object, depfile) = unit_paths(target, source, strip_src);
            TranslationUnit::new(source.clone(), object, depfile)
        })
        .collect()
}

/// Object and depfile paths for `source`.
pub fn unit_paths(target: &TargetDescriptor, source: &Path, strip_src: bool) -> (PathBuf, PathBuf) {
    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    let rel = relative_dir(&relative_path(target.root(), parent), strip_src);
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let object = target.obj_dir().join(&rel).join(format!("{}.o", stem));
    let depfile = target.dep_dir().join(&rel).join(format!("{}.d", stem));
    (object, depfile)
}

/// Keep the relative directory inside the build tree: `..` becomes `__`
/// and root or prefix components are dropped.
fn relative_dir(rel: &Path, strip_src: bool) -> PathBuf {
    let mut out = PathBuf::new();
    for (i, component) in rel.components().enumerate() {
        match component {
            Component::Normal(part) if i == 0 && strip_src && part == "src" => {}
            Component::Normal(part) => out.push(part),
            Component::ParentDir => out.push("__"),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

/// Pairs of sources of `target` that map to the same object file.
pub fn object_collisions(target: &TargetDescriptor) -> Vec<(PathBuf, PathBuf, PathBuf)> {
    let mut seen: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut collisions = Vec::new();
    for unit in units_for(target) {
        match seen.get(&unit.object) {
            Some(first) => collisions.push((first.clone(), unit.source, unit.object)),
            None => {
                seen.insert(unit.object, unit.source);
            }
        }
    }
    collisions
}

//! Core target types.
//!
//! This module contains the target descriptor and the per-kind rule table
//! that decides how each kind of target propagates flags, where its
//! artifact goes and how it is named.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::platform::TargetOs;
use crate::core::surface::Surface;

use super::language::Language;

/// Spelled `target_type` in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    #[serde(rename = "executable", alias = "exe", alias = "bin")]
    Executable,

    /// `.so`, `.dylib` or `.dll`
    #[serde(rename = "shared library", alias = "shared", alias = "sharedlib")]
    SharedLibrary,

    /// `.a` or `.lib`
    #[serde(rename = "static library", alias = "static", alias = "staticlib")]
    StaticLibrary,

    /// Never compiled or linked; exists to export its surface.
    #[serde(rename = "header only", alias = "header-only", alias = "interface")]
    HeaderOnly,
}

/// How a target kind treats the flags it receives from its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Never compiled; merges everything it receives and forwards it.
    PassThrough,
    /// Uses dependencies' public flags, forwards only their interface flags.
    ConsumePublic,
    /// Uses both public and interface flags of dependencies, forwards nothing received.
    Terminal,
}

/// What produces the final artifact of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStep {
    /// No artifact
    None,
    /// Object files are archived
    Archive,
    /// Object files are linked into an executable
    LinkExecutable,
    /// Object files are linked into a shared library
    LinkShared,
}

/// Per-kind behaviour, looked up by [`TargetKind::rules`].
#[derive(Debug, Clone, Copy)]
pub struct KindRules {
    pub propagation: Propagation,
    pub artifact: ArtifactStep,
    /// Directory under the target's build directory holding the artifact
    pub output_dir: &'static str,
}

const EXECUTABLE_RULES: KindRules = KindRules {
    propagation: Propagation::Terminal,
    artifact: ArtifactStep::LinkExecutable,
    output_dir: "bin",
};

const SHARED_RULES: KindRules = KindRules {
    propagation: Propagation::Terminal,
    artifact: ArtifactStep::LinkShared,
    output_dir: "lib",
};

const STATIC_RULES: KindRules = KindRules {
    propagation: Propagation::ConsumePublic,
    artifact: ArtifactStep::Archive,
    output_dir: "lib",
};

const HEADER_ONLY_RULES: KindRules = KindRules {
    propagation: Propagation::PassThrough,
    artifact: ArtifactStep::None,
    output_dir: "",
};

impl TargetKind {
    /// Get the rule table entry for this kind.
    pub fn rules(&self) -> &'static KindRules {
        match self {
            TargetKind::Executable => &EXECUTABLE_RULES,
            TargetKind::SharedLibrary => &SHARED_RULES,
            TargetKind::StaticLibrary => &STATIC_RULES,
            TargetKind::HeaderOnly => &HEADER_ONLY_RULES,
        }
    }

    /// Name as written in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Executable => "executable",
            TargetKind::SharedLibrary => "shared library",
            TargetKind::StaticLibrary => "static library",
            TargetKind::HeaderOnly => "header only",
        }
    }

    /// Get the typical file extension for this target kind, including the dot.
    pub fn suffix(&self, os: TargetOs) -> &'static str {
        match (self, os) {
            (TargetKind::Executable, TargetOs::Windows) => ".exe",
            (TargetKind::Executable, _) => "",
            (TargetKind::SharedLibrary, TargetOs::Windows) => ".dll",
            (TargetKind::SharedLibrary, TargetOs::MacOs) => ".dylib",
            (TargetKind::SharedLibrary, TargetOs::Linux) => ".so",
            (TargetKind::StaticLibrary, TargetOs::Windows) => ".lib",
            (TargetKind::StaticLibrary, _) => ".a",
            (TargetKind::HeaderOnly, _) => "",
        }
    }

    pub fn prefix(&self, os: TargetOs) -> &'static str {
        match (self, os) {
            (TargetKind::StaticLibrary | TargetKind::SharedLibrary, TargetOs::Linux)
            | (TargetKind::StaticLibrary | TargetKind::SharedLibrary, TargetOs::MacOs) => "lib",
            _ => "",
        }
    }

    /// `libnet.a`, `net.lib`, `app.exe` and so on.
    pub fn output_filename(&self, name: &str, os: TargetOs) -> String {
        format!("{}{}{}", self.prefix(os), name, self.suffix(os))
    }

    /// Extra compile flags the platform requires for this kind.
    pub fn platform_compile_flags(&self, os: TargetOs) -> &'static [&'static str] {
        match (self, os) {
            (TargetKind::SharedLibrary, TargetOs::Linux) => &["-fpic"],
            _ => &[],
        }
    }

    pub fn is_compiled(&self) -> bool {
        !self.is_header_only()
    }

    /// Other targets may link against it.
    pub fn is_linkable(&self) -> bool {
        matches!(self, TargetKind::StaticLibrary | TargetKind::SharedLibrary)
    }

    pub fn is_header_only(&self) -> bool {
        matches!(self, TargetKind::HeaderOnly)
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized, immutable configuration of one build target.
///
/// Descriptors are produced by manifest parsing (or built directly in
/// tests) and never change afterwards; everything computed from them
/// lives in the graph, the resolved surfaces and the build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetDescriptor {
    /// Qualified name (`target` or `subproject.target`)
    pub name: String,

    /// What kind of artifact to produce
    pub kind: TargetKind,

    /// Artifact base name, without platform prefix or suffix
    pub output_name: String,

    /// Directory sources are relative to
    pub root_dir: PathBuf,

    /// Directory holding `obj/`, `dep/` and the artifact directory
    pub build_dir: PathBuf,

    /// Source files
    pub sources: Vec<PathBuf>,

    /// Header files found in the include directories
    pub headers: Vec<PathBuf>,

    /// Qualified names of dependencies, in declaration order
    pub dependencies: Vec<String>,

    /// Declared flags and include directories
    pub surface: Surface,
}

impl TargetDescriptor {
    /// Create a descriptor with no sources, dependencies or flags.
    ///
    /// The build directory defaults to `<root>/build/<name>`.
    pub fn new(name: impl Into<String>, kind: TargetKind, root_dir: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let root_dir = root_dir.into();
        TargetDescriptor {
            output_name: name.rsplit('.').next().unwrap_or(&name).to_string(),
            build_dir: root_dir.join("build").join(&name),
            name,
            kind,
            root_dir,
            sources: Vec::new(),
            headers: Vec::new(),
            dependencies: Vec::new(),
            surface: Surface::default(),
        }
    }

    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    pub fn with_output_name(mut self, output_name: impl Into<String>) -> Self {
        self.output_name = output_name.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surface = surface;
        self
    }

    /// Rule table entry for this descriptor's kind.
    pub fn rules(&self) -> &'static KindRules {
        self.kind.rules()
    }

    /// Language used to compile and link this target.
    ///
    /// A target is C only when every source is C.
    pub fn language(&self) -> Language {
        if !self.sources.is_empty()
            && self
                .sources
                .iter()
                .all(|s| Language::from_path(s) == Some(Language::C))
        {
            Language::C
        } else {
            Language::Cxx
        }
    }

    pub fn obj_dir(&self) -> PathBuf {
        self.build_dir.join("obj")
    }

    pub fn dep_dir(&self) -> PathBuf {
        self.build_dir.join("dep")
    }

    /// Directory the artifact is written to.
    pub fn output_dir(&self) -> PathBuf {
        self.build_dir.join(self.rules().output_dir)
    }

    /// Full artifact path, or `None` for header-only targets.
    pub fn output_path(&self, os: TargetOs) -> Option<PathBuf> {
        if self.rules().artifact == ArtifactStep::None {
            return None;
        }
        Some(
            self.output_dir()
                .join(self.kind.output_filename(&self.output_name, os)),
        )
    }

    /// Check whether `root/src` exists, which strips `src` from object paths.
    pub fn has_src_dir(&self) -> bool {
        self.root_dir.join("src").is_dir()
    }

    /// Root directory as a path reference.
    pub fn root(&self) -> &Path {
        &self.root_dir
    }
}

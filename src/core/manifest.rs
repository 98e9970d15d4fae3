//! Manifest parsing (`clinker.toml`).
//!
//! Every top-level table of a manifest is a target; the two reserved keys
//! are `name` (the project name) and `subprojects` (directories holding
//! nested manifests). Tables are read in declaration order, which later
//! breaks ties in the topological walk.
//!
//! ```toml
//! name = "demo"
//! subprojects = ["third_party/fmt"]
//!
//! [lib]
//! target_type = "static library"
//! public-flags.compile = ["-DUSE_LIB"]
//!
//! [app]
//! target_type = "executable"
//! dependencies = ["lib"]
//! flags.compile_debug = ["-DTRACE"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::build_type::BuildType;
use crate::core::surface::{ScopedFlags, ScopedIncludes, Surface};
use crate::core::target::{is_header_file, is_source_file, TargetDescriptor, TargetKind};

/// Manifest file name.
pub const MANIFEST_NAME: &str = "clinker.toml";

/// Errors while reading a manifest and turning it into descriptors.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum ManifestError {
    #[error("failed to read manifest `{}`", .path.display())]
    #[diagnostic(code(clinker::manifest::read))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest `{}`", .path.display())]
    #[diagnostic(code(clinker::manifest::parse))]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid target `{target}` in `{}`", .path.display())]
    #[diagnostic(code(clinker::manifest::target))]
    Target {
        path: PathBuf,
        target: String,
        source: toml::de::Error,
    },

    #[error("key `{key}` in `{}` must be {expected}", .path.display())]
    #[diagnostic(code(clinker::manifest::key))]
    InvalidKey {
        path: PathBuf,
        key: String,
        expected: &'static str,
    },

    #[error("invalid name `{name}`: {reason}")]
    #[diagnostic(code(clinker::manifest::name))]
    InvalidName { name: String, reason: &'static str },

    #[error("invalid source pattern `{pattern}` for target `{target}`")]
    #[diagnostic(code(clinker::manifest::pattern))]
    Pattern {
        target: String,
        pattern: String,
        source: glob::PatternError,
    },

    #[error("subproject `{}` is included more than once", .path.display())]
    #[diagnostic(code(clinker::manifest::subproject))]
    DuplicateSubproject { path: PathBuf },

    #[error("{} problems in `{}`", .errors.len(), .path.display())]
    #[diagnostic(code(clinker::manifest::invalid))]
    Invalid {
        path: PathBuf,
        #[related]
        errors: Vec<ManifestError>,
    },
}

impl ManifestError {
    /// Fail with everything in `errors`: the error itself when there is
    /// only one, [`ManifestError::Invalid`] otherwise.
    pub fn collect(path: &Path, mut errors: Vec<ManifestError>) -> Result<(), ManifestError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ManifestError::Invalid {
                path: path.to_path_buf(),
                errors,
            }),
        }
    }

    /// One line per problem, in report order.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ManifestError::Invalid { errors, .. } => {
                errors.iter().flat_map(ManifestError::messages).collect()
            }
            other => {
                let mut lines = vec![other.to_string()];
                let mut source = std::error::Error::source(other);
                while let Some(cause) = source {
                    lines.push(cause.to_string());
                    source = cause.source();
                }
                vec![lines.join(": ")]
            }
        }
    }
}

/// A parsed manifest, before any filesystem discovery.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Project name, if declared
    pub name: Option<String>,

    /// Subproject directories, relative to the manifest
    pub subprojects: Vec<PathBuf>,

    /// Targets in declaration order
    pub targets: Vec<TargetManifest>,

    /// Directory containing the manifest
    pub manifest_dir: PathBuf,

    /// Path to the manifest file
    pub path: PathBuf,
}

/// One target table.
#[derive(Debug, Clone)]
pub struct TargetManifest {
    pub name: String,
    pub raw: RawTarget,
}

/// Target table as deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTarget {
    /// Defaults to `executable`
    pub target_type: Option<TargetKind>,

    pub output_name: Option<String>,

    #[serde(default)]
    pub sources: RawSources,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub flags: RawFlags,

    #[serde(default, rename = "interface-flags")]
    pub interface_flags: RawFlags,

    #[serde(default, rename = "public-flags")]
    pub public_flags: RawFlags,
}

/// `sources` sub-table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSources {
    pub root: Option<PathBuf>,

    #[serde(default)]
    pub include_directories: Vec<PathBuf>,

    #[serde(default)]
    pub include_directories_public: Vec<PathBuf>,

    #[serde(default)]
    pub source_directories: Vec<PathBuf>,

    /// Extra glob patterns, relative to the target root
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// A flags table: `compile`, `link` and their `_<build type>` variants.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RawFlags(pub BTreeMap<String, Vec<String>>);

impl RawFlags {
    /// Flags for `phase` (`compile` or `link`), followed by the build type variant.
    pub fn select(&self, phase: &str, build_type: BuildType) -> Vec<String> {
        let mut flags = self.0.get(phase).cloned().unwrap_or_default();
        if let Some(extra) = self.0.get(&format!("{}_{}", phase, build_type.as_str())) {
            flags.extend(extra.iter().cloned());
        }
        flags
    }

    /// Keys that are neither a phase nor a phase/build-type variant.
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .filter(|key| !is_flag_key(key))
            .map(|key| key.as_str())
            .collect()
    }
}

fn is_flag_key(key: &str) -> bool {
    ["compile", "link"].iter().any(|phase| {
        key == *phase
            || BuildType::ALL
                .iter()
                .any(|bt| key.strip_prefix(phase).and_then(|k| k.strip_prefix('_')) == Some(bt.as_str()))
    })
}

/// Check that a target or project name can be qualified unambiguously.
pub fn validate_name(name: &str) -> Result<(), ManifestError> {
    let reason = if name.is_empty() {
        "name cannot be empty"
    } else if name.contains('.') {
        "`.` is reserved for subproject qualification"
    } else if name.chars().any(char::is_whitespace) {
        "name cannot contain whitespace"
    } else {
        return Ok(());
    };
    Err(ManifestError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let table: toml::Table = toml::from_str(content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let manifest_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let mut name = None;
        let mut subprojects = Vec::new();
        let mut targets = Vec::new();
        let mut errors = Vec::new();

        for (key, value) in table {
            match key.as_str() {
                "name" => {
                    let toml::Value::String(s) = value else {
                        errors.push(invalid_key(path, &key, "a string"));
                        continue;
                    };
                    match validate_name(&s) {
                        Ok(()) => name = Some(s),
                        Err(e) => errors.push(e),
                    }
                }
                "subprojects" => {
                    let dirs = match value {
                        toml::Value::Array(items) => items
                            .into_iter()
                            .map(|item| match item {
                                toml::Value::String(dir) => Some(PathBuf::from(dir)),
                                _ => None,
                            })
                            .collect::<Option<Vec<_>>>(),
                        _ => None,
                    };
                    match dirs {
                        Some(dirs) => subprojects = dirs,
                        None => errors.push(invalid_key(path, &key, "an array of directories")),
                    }
                }
                _ => {
                    if !value.is_table() {
                        errors.push(invalid_key(path, &key, "a target table"));
                        continue;
                    }
                    let named = validate_name(&key);
                    let raw: Result<RawTarget, _> = value.try_into();
                    let raw = match (named, raw) {
                        (Ok(()), Ok(raw)) => raw,
                        (named, raw) => {
                            errors.extend(named.err());
                            errors.extend(raw.err().map(|source| ManifestError::Target {
                                path: path.to_path_buf(),
                                target: key.clone(),
                                source,
                            }));
                            continue;
                        }
                    };
                    for flags in [&raw.flags, &raw.public_flags, &raw.interface_flags] {
                        for unknown in flags.unknown_keys() {
                            tracing::warn!("target `{}`: ignoring unknown flag key `{}`", key, unknown);
                        }
                    }
                    targets.push(TargetManifest { name: key, raw });
                }
            }
        }
        ManifestError::collect(path, errors)?;

        Ok(Manifest {
            name,
            subprojects,
            targets,
            manifest_dir,
            path: path.to_path_buf(),
        })
    }

    /// Name of the project, falling back to the directory name.
    pub fn project_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.manifest_dir
                .file_name()
                .map(|n| n.to_string_lossy().replace('.', "_"))
                .unwrap_or_else(|| "project".to_string())
        })
    }
}

fn invalid_key(path: &Path, key: &str, expected: &'static str) -> ManifestError {
    ManifestError::InvalidKey {
        path: path.to_path_buf(),
        key: key.to_string(),
        expected,
    }
}

impl TargetManifest {
    /// Kind of this target.
    pub fn kind(&self) -> TargetKind {
        self.raw.target_type.unwrap_or(TargetKind::Executable)
    }

    /// Root directory: `sources.root`, else a directory named like the
    /// target, else the manifest directory.
    pub fn root_dir(&self, manifest_dir: &Path) -> PathBuf {
        match &self.raw.sources.root {
            Some(root) => manifest_dir.join(root),
            None => {
                let named = manifest_dir.join(&self.name);
                if named.is_dir() {
                    named
                } else {
                    manifest_dir.to_path_buf()
                }
            }
        }
    }

    /// Build the descriptor for this target.
    ///
    /// `qualified_name` and `build_dir` are decided by the project; the
    /// dependency list is copied as written and qualified by the caller.
    pub fn to_descriptor(
        &self,
        manifest_dir: &Path,
        qualified_name: String,
        build_dir: PathBuf,
        build_type: BuildType,
    ) -> Result<TargetDescriptor, ManifestError> {
        let kind = self.kind();
        let root = self.root_dir(manifest_dir);
        let raw = &self.raw;

        let mut include = ScopedIncludes {
            private: raw
                .sources
                .include_directories
                .iter()
                .map(|d| root.join(d))
                .collect(),
            public: raw
                .sources
                .include_directories_public
                .iter()
                .map(|d| root.join(d))
                .collect(),
        };
        if include.private.is_empty() && include.public.is_empty() && root.join("include").is_dir()
        {
            include.public.push(root.join("include"));
        }

        let sources = if kind.is_compiled() {
            self.discover_sources(&root)?
        } else {
            Vec::new()
        };

        let headers = include
            .private
            .iter()
            .chain(include.public.iter())
            .flat_map(|dir| walk_files(dir, true, is_header_file))
            .collect();

        let surface = Surface {
            compile: ScopedFlags {
                private: raw.flags.select("compile", build_type),
                public: raw.public_flags.select("compile", build_type),
                interface: raw.interface_flags.select("compile", build_type),
            },
            link: ScopedFlags {
                private: raw.flags.select("link", build_type),
                public: raw.public_flags.select("link", build_type),
                interface: raw.interface_flags.select("link", build_type),
            },
            include,
        };

        Ok(TargetDescriptor {
            output_name: raw.output_name.clone().unwrap_or_else(|| self.name.clone()),
            name: qualified_name,
            kind,
            root_dir: root,
            build_dir,
            sources,
            headers,
            dependencies: raw.dependencies.clone(),
            surface,
        })
    }

    fn discover_sources(&self, root: &Path) -> Result<Vec<PathBuf>, ManifestError> {
        let source_dirs = &self.raw.sources.source_directories;
        let mut sources = Vec::new();

        if source_dirs.is_empty() {
            let src = root.join("src");
            if src.is_dir() {
                sources.extend(walk_files(&src, true, is_source_file));
            } else if self.raw.sources.patterns.is_empty() {
                // Only the top level, so nested subprojects are not swallowed
                sources.extend(walk_files(root, false, is_source_file));
            }
        } else {
            for dir in source_dirs {
                sources.extend(walk_files(&root.join(dir), true, is_source_file));
            }
        }

        for pattern in &self.raw.sources.patterns {
            let full = root.join(pattern);
            let paths = glob::glob(&full.to_string_lossy()).map_err(|source| {
                ManifestError::Pattern {
                    target: self.name.clone(),
                    pattern: pattern.clone(),
                    source,
                }
            })?;
            for entry in paths {
                match entry {
                    Ok(path) if path.is_file() => sources.push(path),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("glob error: {}", e),
                }
            }
        }

        sources.sort();
        sources.dedup();
        Ok(sources)
    }
}

fn walk_files(dir: &Path, recursive: bool, keep: fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(dir).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }
    walker
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && keep(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

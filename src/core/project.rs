//! Project loading.
//!
//! A project is a root manifest plus any number of nested subprojects.
//! Loading flattens all of them into one list of [`TargetDescriptor`]s
//! with qualified names (`target` at the root, `sub.target` inside the
//! subproject `sub`). No graph work happens here: descriptors may still
//! name dependencies that do not exist, which the graph builder reports.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::build_type::BuildType;
use crate::core::manifest::{validate_name, Manifest, ManifestError, MANIFEST_NAME};
use crate::core::target::TargetDescriptor;
use crate::util::fs::normalize_path;

/// Options that shape descriptor construction.
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub build_type: BuildType,

    /// Build directory, relative to the root project unless absolute
    pub build_dir: PathBuf,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        ProjectOptions {
            build_type: BuildType::Default,
            build_dir: PathBuf::from("build"),
        }
    }
}

/// The flattened target set of one invocation.
#[derive(Debug, Clone)]
pub struct Project {
    /// Root project name
    pub name: String,

    /// Directory of the root manifest
    pub root: PathBuf,

    /// Build directory root
    pub build_root: PathBuf,

    pub build_type: BuildType,

    /// All targets, root project first, subprojects depth-first
    pub targets: Vec<TargetDescriptor>,

    /// Qualified names of the root project's own targets
    pub root_targets: Vec<String>,
}

impl Project {
    /// Load a project and all of its subprojects.
    pub fn load(manifest_path: &Path, opts: &ProjectOptions) -> Result<Self, ManifestError> {
        let manifest = Manifest::load(manifest_path)?;
        let root = manifest.manifest_dir.clone();
        let build_root = root.join(&opts.build_dir);

        let mut loader = Loader {
            build_root: &build_root,
            build_type: opts.build_type,
            seen: HashSet::new(),
            targets: Vec::new(),
        };
        loader.seen.insert(normalize_path(manifest_path));
        let root_targets = loader.load(&manifest, "")?;

        tracing::debug!(
            "loaded {} target(s) from {}",
            loader.targets.len(),
            manifest_path.display()
        );

        Ok(Project {
            name: manifest.project_name(),
            targets: loader.targets,
            root,
            build_root,
            build_type: opts.build_type,
            root_targets,
        })
    }

    /// Build a project from descriptors directly.
    ///
    /// Every target counts as a root target.
    pub fn from_targets(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        targets: Vec<TargetDescriptor>,
    ) -> Self {
        let root = root.into();
        Project {
            name: name.into(),
            build_root: root.join("build"),
            root,
            build_type: BuildType::Default,
            root_targets: targets.iter().map(|t| t.name.clone()).collect(),
            targets,
        }
    }

    /// Find a target by qualified name.
    pub fn target(&self, name: &str) -> Option<&TargetDescriptor> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Qualified names of every target, including subprojects.
    pub fn all_target_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }
}

struct Loader<'a> {
    build_root: &'a Path,
    build_type: BuildType,
    seen: HashSet<PathBuf>,
    targets: Vec<TargetDescriptor>,
}

impl Loader<'_> {
    /// Load one manifest's targets, then its subprojects. Returns the
    /// qualified names of the manifest's own targets.
    ///
    /// Problems in one target or subproject do not hide the others: all
    /// of them are reported together.
    fn load(&mut self, manifest: &Manifest, prefix: &str) -> Result<Vec<String>, ManifestError> {
        let mut errors = Vec::new();
        let mut subprojects = Vec::new();
        for dir in &manifest.subprojects {
            let path = manifest.manifest_dir.join(dir).join(MANIFEST_NAME);
            if !self.seen.insert(normalize_path(&path)) {
                errors.push(ManifestError::DuplicateSubproject { path });
                continue;
            }
            let sub = match Manifest::load(&path) {
                Ok(sub) => sub,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let name = sub.project_name();
            match validate_name(&name) {
                Ok(()) => subprojects.push((name, sub)),
                Err(e) => errors.push(e),
            }
        }

        let local: HashSet<&str> = manifest.targets.iter().map(|t| t.name.as_str()).collect();
        let sub_names: HashSet<&str> = subprojects.iter().map(|(n, _)| n.as_str()).collect();

        let mut own = Vec::new();
        for target in &manifest.targets {
            let qualified = format!("{}{}", prefix, target.name);
            let build_dir = self.build_dir_for(&qualified);
            let mut desc = match target.to_descriptor(
                &manifest.manifest_dir,
                qualified.clone(),
                build_dir,
                self.build_type,
            ) {
                Ok(desc) => desc,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            desc.dependencies = desc
                .dependencies
                .iter()
                .map(|dep| qualify(dep, prefix, &local, &sub_names))
                .collect();
            self.targets.push(desc);
            own.push(qualified);
        }

        for (name, sub) in &subprojects {
            if let Err(e) = self.load(sub, &format!("{}{}.", prefix, name)) {
                errors.push(e);
            }
        }

        ManifestError::collect(&manifest.path, errors)?;
        Ok(own)
    }

    fn build_dir_for(&self, qualified: &str) -> PathBuf {
        let mut dir = self.build_root.to_path_buf();
        for segment in qualified.split('.') {
            dir.push(segment);
        }
        dir.join(self.build_type.as_str())
    }
}

/// Resolve a dependency name written inside the project with `prefix`.
///
/// Names of local targets and names reaching into a direct subproject are
/// relative to the declaring project; anything else is taken as a fully
/// qualified name.
fn qualify(dep: &str, prefix: &str, local: &HashSet<&str>, subprojects: &HashSet<&str>) -> String {
    let first = dep.split('.').next().unwrap_or(dep);
    let relative = if dep.contains('.') {
        subprojects.contains(first)
    } else {
        local.contains(dep)
    };
    if relative {
        format!("{}{}", prefix, dep)
    } else {
        dep.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::TargetKind;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, contents: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, contents).unwrap();
    }

    fn nested_project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(
            root,
            "clinker.toml",
            r#"
name = "top"
subprojects = ["vendor/fmt"]

[app]
target_type = "executable"
dependencies = ["fmt.core", "util"]

[util]
target_type = "header only"
"#,
        );
        write(root, "app/main.cpp", "int main() { return 0; }\n");
        write(
            root,
            "vendor/fmt/clinker.toml",
            r#"
name = "fmt"

[core]
target_type = "static library"
dependencies = ["headers", "util"]

[headers]
target_type = "header only"
"#,
        );
        write(root, "vendor/fmt/core/src/format.cpp", "\n");
        tmp
    }

    #[test]
    fn test_subproject_targets_are_qualified() {
        let tmp = nested_project();
        let project =
            Project::load(&tmp.path().join("clinker.toml"), &ProjectOptions::default()).unwrap();

        assert_eq!(project.name, "top");
        assert_eq!(
            project.all_target_names(),
            vec!["app", "util", "fmt.core", "fmt.headers"]
        );
        assert_eq!(project.root_targets, vec!["app", "util"]);
    }

    #[test]
    fn test_dependencies_resolve_relative_to_declaring_project() {
        let tmp = nested_project();
        let project =
            Project::load(&tmp.path().join("clinker.toml"), &ProjectOptions::default()).unwrap();

        let app = project.target("app").unwrap();
        assert_eq!(app.dependencies, vec!["fmt.core", "util"]);

        // `util` is not a target of fmt, so it stays as written and
        // resolves to the root project's target
        let core = project.target("fmt.core").unwrap();
        assert_eq!(core.dependencies, vec!["fmt.headers", "util"]);
        assert_eq!(core.kind, TargetKind::StaticLibrary);
        assert_eq!(core.sources.len(), 1);
    }

    #[test]
    fn test_build_dirs_follow_qualification() {
        let tmp = nested_project();
        let opts = ProjectOptions {
            build_type: BuildType::Release,
            ..ProjectOptions::default()
        };
        let project = Project::load(&tmp.path().join("clinker.toml"), &opts).unwrap();

        let core = project.target("fmt.core").unwrap();
        assert_eq!(
            core.build_dir,
            tmp.path().join("build").join("fmt").join("core").join("release")
        );
        let app = project.target("app").unwrap();
        assert_eq!(app.build_dir, tmp.path().join("build/app/release"));
    }

    #[test]
    fn test_subproject_included_twice() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "clinker.toml",
            "subprojects = [\"a\", \"a\"]\n",
        );
        write(tmp.path(), "a/clinker.toml", "[x]\n");
        let err = Project::load(&tmp.path().join("clinker.toml"), &ProjectOptions::default())
            .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateSubproject { .. }));
    }

    #[test]
    fn test_problems_across_targets_and_subprojects_are_reported_together() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "clinker.toml",
            r#"
subprojects = ["vendor/zlib", "vendor/missing"]

[app]
sources.patterns = ["src/[*.cpp"]

[tool]
"#,
        );
        write(tmp.path(), "vendor/zlib/clinker.toml", "[z]\ntarget_type = \"bogus\"\n");
        let err = Project::load(&tmp.path().join("clinker.toml"), &ProjectOptions::default())
            .unwrap_err();

        let ManifestError::Invalid { ref errors, .. } = err else {
            panic!("expected every problem at once, got {:?}", err);
        };
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ManifestError::Target { target, .. } if target == "z")));
        assert!(errors.iter().any(|e| matches!(
            e,
            ManifestError::Read { path, .. } if path.ends_with("vendor/missing/clinker.toml")
        )));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ManifestError::Pattern { target, .. } if target == "app")));
    }

    #[test]
    fn test_from_targets() {
        let project = Project::from_targets(
            "p",
            "/p",
            vec![TargetDescriptor::new("a", TargetKind::HeaderOnly, "/p")],
        );
        assert_eq!(project.root_targets, vec!["a"]);
        assert!(project.target("a").is_some());
        assert!(project.target("b").is_none());
    }
}

//! On-disk project fixtures.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use crate::core::manifest::MANIFEST_NAME;
use crate::util::context::GlobalContext;

/// A project laid out in a temporary directory.
///
/// Dropping the fixture removes the directory.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn new() -> Self {
        ProjectFixture {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// An executable `app` depending on a static library `lib` that
    /// publishes `-DUSE_LIB`.
    pub fn app_with_library() -> Self {
        Self::new()
            .manifest(
                r#"name = "demo"

[lib]
target_type = "static library"
public-flags.compile = ["-DUSE_LIB"]

[app]
target_type = "executable"
dependencies = ["lib"]
"#,
            )
            .file("lib/src/lib.cpp", "int lib_value() { return 1; }\n")
            .file("lib/include/lib.h", "int lib_value();\n")
            .file(
                "app/src/main.cpp",
                "#include <lib.h>\nint main() { return lib_value(); }\n",
            )
    }

    pub fn manifest(self, contents: &str) -> Self {
        self.file(MANIFEST_NAME, contents)
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn file(self, rel: impl AsRef<Path>, contents: &str) -> Self {
        self.write(rel, contents);
        self
    }

    pub fn write(&self, rel: impl AsRef<Path>, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create fixture directory");
        }
        fs::write(&path, contents).expect("failed to write fixture file");
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path(MANIFEST_NAME)
    }

    /// Context whose working directory is the project root.
    pub fn context(&self) -> GlobalContext {
        GlobalContext::with_cwd(self.root().to_path_buf())
    }

    /// Set the modification time of `rel` to `secs` seconds from now.
    pub fn touch_ahead(&self, rel: impl AsRef<Path>, secs: u64) {
        let when = SystemTime::now() + Duration::from_secs(secs);
        set_mtime(&self.path(rel), when);
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Set the modification time of an existing file.
pub fn set_mtime(path: &Path, when: SystemTime) {
    let file = File::options()
        .write(true)
        .open(path)
        .unwrap_or_else(|e| panic!("failed to open {}: {}", path.display(), e));
    file.set_modified(when)
        .unwrap_or_else(|e| panic!("failed to set mtime of {}: {}", path.display(), e));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::fs::mtime;

    #[test]
    fn test_app_with_library_layout() {
        let project = ProjectFixture::app_with_library();
        assert!(project.manifest_path().is_file());
        assert!(project.path("lib/src/lib.cpp").is_file());
        assert!(project.path("app/src/main.cpp").is_file());
    }

    #[test]
    fn test_touch_ahead_moves_mtime_forward() {
        let project = ProjectFixture::new().file("a.h", "");
        let before = mtime(&project.path("a.h")).unwrap();
        project.touch_ahead("a.h", 60);
        assert!(mtime(&project.path("a.h")).unwrap() > before);
    }
}

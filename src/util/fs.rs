//! Filesystem helpers shared by the build steps.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

/// Delete a build tree. A tree that was never created is not an error.
pub fn remove_dir_all_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("failed to remove `{}`", dir.display()))
        }
        _ => Ok(()),
    }
}

/// Delete a stale output so a failed step never leaves it looking fresh.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Create the directory an output file will be written into.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create directory `{}`", parent.display()))
}

pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    fs::write(path, contents).with_context(|| format!("failed to write `{}`", path.display()))
}

/// Last modification time; `None` for anything missing or unreadable.
pub fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Canonical form when the path exists, the path unchanged otherwise.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// `path` expressed relative to `base`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_string_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("obj/net/socket.o.d");
        write_string(&path, "socket.o: socket.c").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "socket.o: socket.c");
    }

    #[test]
    fn test_removal_tolerates_missing_paths() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("main.o");
        let dir = tmp.path().join("build");

        remove_file_if_exists(&file).unwrap();
        remove_dir_all_if_exists(&dir).unwrap();

        fs::write(&file, "").unwrap();
        fs::create_dir_all(dir.join("debug/obj")).unwrap();
        remove_file_if_exists(&file).unwrap();
        remove_dir_all_if_exists(&dir).unwrap();
        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_mtime_of_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert!(mtime(&tmp.path().join("missing.h")).is_none());
        fs::write(tmp.path().join("present.h"), "").unwrap();
        assert!(mtime(&tmp.path().join("present.h")).is_some());
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/p/lib"), Path::new("/p/lib/src/net")),
            PathBuf::from("src/net")
        );
    }
}

//! Where a command was started, and what that implies: the manifest found
//! by walking upward, and the configuration files that apply.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::MANIFEST_NAME;
use crate::util::config::{global_config_path, load_config, project_config_path, Config};
use crate::util::diagnostic::suggestions;

#[derive(Debug, Clone)]
pub struct GlobalContext {
    cwd: PathBuf,
    /// User-wide configuration file, when a home directory is known.
    global_config: Option<PathBuf>,
}

impl GlobalContext {
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            global_config: global_config_path(),
        }
    }

    /// The nearest `clinker.toml` in the working directory or above it.
    pub fn find_manifest(&self) -> Result<PathBuf> {
        let found = self
            .cwd
            .ancestors()
            .map(|dir| dir.join(MANIFEST_NAME))
            .find(|candidate| candidate.is_file());
        match found {
            Some(manifest) => Ok(manifest),
            None => anyhow::bail!(
                "could not find `{}` in `{}` or any parent directory\n{}",
                MANIFEST_NAME,
                self.cwd.display(),
                suggestions::NO_MANIFEST
            ),
        }
    }

    /// Directory holding the nearest manifest.
    pub fn find_project_root(&self) -> Result<PathBuf> {
        let manifest = self.find_manifest()?;
        Ok(manifest.parent().unwrap_or(&self.cwd).to_path_buf())
    }

    /// Global file overlaid with the project's `.clinker/config.toml`.
    pub fn load_config(&self, project_root: &Path) -> Config {
        load_config(
            self.global_config.as_deref(),
            &project_config_path(project_root),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_manifest_searches_upward() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_NAME), "").unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested);
        assert_eq!(ctx.find_manifest().unwrap(), tmp.path().join(MANIFEST_NAME));
        assert_eq!(ctx.find_project_root().unwrap(), tmp.path());
    }

    #[test]
    fn test_find_manifest_missing() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf());
        let err = ctx.find_manifest().unwrap_err();
        assert!(err.to_string().contains(MANIFEST_NAME));
    }

    #[test]
    fn test_project_config_is_loaded() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".clinker")).unwrap();
        fs::write(
            tmp.path().join(".clinker/config.toml"),
            "[build]\nbuild_dir = \"out\"\n",
        )
        .unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf());
        let config = ctx.load_config(tmp.path());
        assert_eq!(config.build.build_dir, Some(PathBuf::from("out")));
    }
}

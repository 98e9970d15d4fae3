//! Implementation of `clinker clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::build_type::BuildType;
use crate::core::project::{Project, ProjectOptions};
use crate::util::context::GlobalContext;
use crate::util::fs::remove_dir_all_if_exists;

/// Options for the clean command.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Only remove the output of this build type
    pub build_type: Option<BuildType>,
}

/// Remove build output, returning the directories that were removed.
///
/// Without a build type the whole build directory goes. With one, only the
/// per-target directories of that build type are removed, so other build
/// types stay up to date.
pub fn clean(ctx: &GlobalContext, opts: &CleanOptions) -> Result<Vec<PathBuf>> {
    let manifest_path = ctx.find_manifest()?;
    let project_root = ctx.find_project_root()?;
    let config = ctx.load_config(&project_root);
    let build_dir = config
        .build
        .build_dir
        .unwrap_or_else(|| PathBuf::from("build"));

    let Some(build_type) = opts.build_type else {
        let build_root = project_root.join(build_dir);
        if !build_root.exists() {
            return Ok(Vec::new());
        }
        remove_dir_all_if_exists(&build_root)?;
        return Ok(vec![build_root]);
    };

    let project = Project::load(
        &manifest_path,
        &ProjectOptions {
            build_type,
            build_dir,
        },
    )?;

    let mut removed = Vec::new();
    for target in &project.targets {
        if target.build_dir.exists() {
            tracing::debug!("removing {}", target.build_dir.display());
            remove_dir_all_if_exists(&target.build_dir)?;
            removed.push(target.build_dir.clone());
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ProjectFixture;

    #[test]
    fn test_clean_removes_build_root() {
        let project = ProjectFixture::app_with_library().file("build/app/default/obj/main.o", "");
        let removed = clean(&project.context(), &CleanOptions::default()).unwrap();
        assert_eq!(removed, vec![project.path("build")]);
        assert!(!project.path("build").exists());
    }

    #[test]
    fn test_clean_nothing_to_remove() {
        let project = ProjectFixture::app_with_library();
        assert!(clean(&project.context(), &CleanOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_clean_single_build_type() {
        let project = ProjectFixture::app_with_library()
            .file("build/app/debug/obj/main.o", "")
            .file("build/app/release/obj/main.o", "")
            .file("build/lib/debug/lib/liblib.a", "");
        let opts = CleanOptions {
            build_type: Some(BuildType::Debug),
        };
        let removed = clean(&project.context(), &opts).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!project.path("build/app/debug").exists());
        assert!(!project.path("build/lib/debug").exists());
        assert!(project.path("build/app/release/obj/main.o").exists());
    }
}

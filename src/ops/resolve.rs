//! Project resolution.
//!
//! Loads the manifest tree and the tool configuration, then validates the
//! target graph and propagates flags across it. Every command that looks
//! at targets starts here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use petgraph::graph::NodeIndex;

use crate::builder::graph::{ConfigurationError, DependencyGraph, Violation};
use crate::builder::surface_resolver::{EffectiveFlags, ResolvedSurfaces, SurfaceResolver};
use crate::core::build_type::BuildType;
use crate::core::project::{Project, ProjectOptions};
use crate::core::target::TargetDescriptor;
use crate::util::config::Config;
use crate::util::context::GlobalContext;

/// Options for [`resolve_project`].
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Overrides the configured build type
    pub build_type: Option<BuildType>,
}

/// A loaded and validated project.
#[derive(Debug)]
pub struct ResolvedProject {
    pub config: Config,
    pub project: Project,
    pub graph: DependencyGraph,
    pub surfaces: ResolvedSurfaces,
}

/// Load the project around the context's working directory.
///
/// Fails with a [`ConfigurationError`] listing every violation when the
/// target set does not form a valid graph.
pub fn resolve_project(ctx: &GlobalContext, opts: &ResolveOptions) -> Result<ResolvedProject> {
    resolve_with_config(ctx, load_project_config(ctx)?, opts)
}

/// The merged configuration of the project around the working directory.
pub fn load_project_config(ctx: &GlobalContext) -> Result<Config> {
    let project_root = ctx.find_project_root()?;
    Ok(ctx.load_config(&project_root))
}

/// Like [`resolve_project`], with the configuration already loaded.
pub fn resolve_with_config(
    ctx: &GlobalContext,
    config: Config,
    opts: &ResolveOptions,
) -> Result<ResolvedProject> {
    let manifest_path = ctx.find_manifest()?;

    let build_type = match opts.build_type {
        Some(bt) => bt,
        None => configured_build_type(&config)?,
    };
    let project_opts = ProjectOptions {
        build_type,
        build_dir: config
            .build
            .build_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("build")),
    };

    let project = Project::load(&manifest_path, &project_opts)?;
    tracing::debug!(
        "project `{}`: {} target(s), build type {}",
        project.name,
        project.targets.len(),
        build_type
    );

    let graph = DependencyGraph::build(project.targets.clone())?;
    let surfaces = SurfaceResolver::resolve(&graph);

    Ok(ResolvedProject {
        config,
        project,
        graph,
        surfaces,
    })
}

fn configured_build_type(config: &Config) -> Result<BuildType> {
    match &config.build.build_type {
        Some(name) => name
            .parse()
            .with_context(|| "invalid `build.build_type` in configuration"),
        None => Ok(BuildType::Default),
    }
}

impl ResolvedProject {
    /// The build set for the requested targets.
    ///
    /// `all` selects every target including subprojects and cannot be
    /// combined with explicit targets. With neither, the root project's
    /// own targets are the roots.
    pub fn select(&self, targets: &[String], all: bool) -> Result<Vec<NodeIndex>, ConfigurationError> {
        if all && !targets.is_empty() {
            return Err(ConfigurationError::new(vec![
                Violation::ConflictingSelection {
                    targets: targets.to_vec(),
                },
            ]));
        }
        let roots = if !targets.is_empty() {
            targets.to_vec()
        } else if all {
            self.project.all_target_names()
        } else {
            self.project.root_targets.clone()
        };
        tracing::debug!("build roots: {}", roots.join(", "));
        self.graph.build_set(&roots)
    }

    /// Descriptor and effective flags of `name`.
    pub fn target_flags(
        &self,
        name: &str,
    ) -> Result<(&TargetDescriptor, &EffectiveFlags), ConfigurationError> {
        let unknown = || {
            ConfigurationError::new(vec![Violation::UnknownTarget {
                name: name.to_string(),
            }])
        };
        let ix = self.graph.index_of(name).ok_or_else(unknown)?;
        let flags = self.surfaces.get(ix).ok_or_else(unknown)?;
        Ok((self.graph.target(ix), flags))
    }
}

//! A [`BuildPlan`] is the per-target view the scheduler works from: the
//! translation units with their staleness already decided, the final
//! compile flags and include directories, and the archive or link step.
//! Targets are listed in topological order of the build set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::builder::fingerprint::{check_unit, LinkRecord};
use crate::builder::graph::DependencyGraph;
use crate::builder::surface_resolver::ResolvedSurfaces;
use crate::builder::toolchain::{
    ArchiveInput, CompileInput, DepfileInput, LinkInput, Toolchain,
};
use crate::builder::unit::{units_for, TranslationUnit};
use crate::core::build_type::BuildType;
use crate::core::target::{ArtifactStep, Language, TargetKind};
use crate::util::fs;

#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub build_type: BuildType,
    pub targets: Vec<TargetPlan>,
}

/// Everything needed to build one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetPlan {
    pub name: String,
    pub kind: TargetKind,
    pub root: PathBuf,
    /// Positions of direct dependencies in [`BuildPlan::targets`]
    pub deps: Vec<usize>,
    pub language: Language,
    pub units: Vec<TranslationUnit>,
    /// Toolchain defaults, propagated flags, then platform flags
    pub compile_flags: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip)]
    pub link_record: Option<LinkRecord>,
}

/// How the artifact of a target is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum LinkStep {
    Archive {
        objects: Vec<PathBuf>,
        output: PathBuf,
    },
    Link {
        objects: Vec<PathBuf>,
        output: PathBuf,
        flags: Vec<String>,
        lib_dirs: Vec<PathBuf>,
        libs: Vec<String>,
        shared: bool,
    },
}

impl LinkStep {
    pub fn output(&self) -> &Path {
        match self {
            LinkStep::Archive { output, .. } | LinkStep::Link { output, .. } => output,
        }
    }
}

impl BuildPlan {
    /// Plan `build_set` (in topological order).
    ///
    /// Staleness of every unit is decided here, from the depfiles of the
    /// previous build, before anything is regenerated.
    pub fn new(
        graph: &DependencyGraph,
        surfaces: &ResolvedSurfaces,
        build_set: &[NodeIndex],
        toolchain: &dyn Toolchain,
        build_type: BuildType,
        force: bool,
    ) -> Self {
        let position: HashMap<NodeIndex, usize> = build_set
            .iter()
            .enumerate()
            .map(|(pos, &ix)| (ix, pos))
            .collect();

        let targets = build_set
            .iter()
            .map(|&ix| {
                plan_target(graph, surfaces, &position, ix, toolchain, build_type, force)
            })
            .collect();

        BuildPlan {
            build_type,
            targets,
        }
    }

    /// Position of the target called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.targets.iter().position(|t| t.name == name)
    }

    /// Number of units that will be compiled.
    pub fn stale_unit_count(&self) -> usize {
        self.targets
            .iter()
            .map(|t| t.units.iter().filter(|u| u.stale).count())
            .sum()
    }

    pub fn unit_count(&self) -> usize {
        self.targets.iter().map(|t| t.units.len()).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize build plan")
    }

    /// Write a compilation database covering every planned unit, fresh
    /// or not.
    pub fn emit_compile_commands(&self, toolchain: &dyn Toolchain, path: &Path) -> Result<()> {
        let commands: Vec<CompileCommand> = self
            .targets
            .iter()
            .flat_map(|target| {
                target.units.iter().map(move |unit| {
                    let spec = toolchain.compile_command(&target.compile_input(unit));
                    CompileCommand {
                        directory: target.root.display().to_string(),
                        file: unit.source.display().to_string(),
                        arguments: spec.argv(),
                        output: unit.object.display().to_string(),
                    }
                })
            })
            .collect();

        let json = serde_json::to_string_pretty(&commands)?;
        fs::write_string(path, &json)?;
        tracing::info!("wrote {} ({} entries)", path.display(), commands.len());

        Ok(())
    }
}

impl TargetPlan {
    pub fn compile_input(&self, unit: &TranslationUnit) -> CompileInput {
        CompileInput {
            source: unit.source.clone(),
            object: unit.object.clone(),
            include_dirs: self.include_dirs.clone(),
            flags: self.compile_flags.clone(),
            language: self.language,
        }
    }

    pub fn depfile_input(&self, unit: &TranslationUnit) -> DepfileInput {
        DepfileInput::for_compile(&self.compile_input(unit), &unit.depfile)
    }

    pub fn archive_input(&self) -> Option<ArchiveInput> {
        match &self.link {
            Some(LinkStep::Archive { objects, output }) => Some(ArchiveInput {
                objects: objects.clone(),
                output: output.clone(),
            }),
            _ => None,
        }
    }

    pub fn link_input(&self) -> Option<LinkInput> {
        match &self.link {
            Some(LinkStep::Link {
                objects,
                output,
                flags,
                lib_dirs,
                libs,
                shared,
            }) => Some(LinkInput {
                objects: objects.clone(),
                output: output.clone(),
                flags: flags.clone(),
                lib_dirs: lib_dirs.clone(),
                libs: libs.clone(),
                shared: *shared,
                language: self.language,
            }),
            _ => None,
        }
    }

    /// The freshness record of the artifact step. The stamp lives in
    /// `stamp_dir` and is named after the artifact.
    fn record_link(
        &self,
        toolchain: &dyn Toolchain,
        library_artifacts: Vec<PathBuf>,
        stamp_dir: PathBuf,
    ) -> Option<LinkRecord> {
        let (objects, command) = if let Some(input) = self.archive_input() {
            let command = toolchain.archive_command(&input);
            (input.objects, command)
        } else {
            let input = self.link_input()?;
            let command = toolchain.link_command(&input);
            (input.objects, command)
        };
        let output = self.link.as_ref()?.output().to_path_buf();
        let stamp = stamp_dir.join(format!(
            "{}.link",
            output.file_name().unwrap_or_default().to_string_lossy()
        ));
        Some(LinkRecord {
            inputs: objects.into_iter().chain(library_artifacts).collect(),
            command: command.display(),
            stamp,
            output,
        })
    }

    pub fn stale_units(&self) -> impl Iterator<Item = (usize, &TranslationUnit)> {
        self.units.iter().enumerate().filter(|(_, u)| u.stale)
    }
}

fn plan_target(
    graph: &DependencyGraph,
    surfaces: &ResolvedSurfaces,
    position: &HashMap<NodeIndex, usize>,
    ix: NodeIndex,
    toolchain: &dyn Toolchain,
    build_type: BuildType,
    force: bool,
) -> TargetPlan {
    let target = graph.target(ix);
    let effective = surfaces.get(ix).cloned().unwrap_or_default();
    let os = toolchain.os();

    let mut units = units_for(target);
    for unit in &mut units {
        let staleness = check_unit(unit, force);
        unit.stale = staleness.is_stale();
        if unit.stale {
            tracing::debug!("{}: {} is stale ({})", target.name, unit.source.display(), staleness);
        }
    }

    let mut compile_flags = Vec::new();
    if target.kind.is_compiled() {
        compile_flags.extend(toolchain.default_compile_flags(build_type));
        compile_flags.extend(effective.compile.iter().cloned());
        compile_flags.extend(
            target
                .kind
                .platform_compile_flags(os)
                .iter()
                .map(|f| f.to_string()),
        );
        compile_flags = dedup(compile_flags);
    }

    let output = target.output_path(os);
    let objects: Vec<PathBuf> = units.iter().map(|u| u.object.clone()).collect();
    let mut library_artifacts = Vec::new();

    let link = output.clone().and_then(|output| match target.rules().artifact {
        ArtifactStep::None => None,
        ArtifactStep::Archive => {
            let mut objects = objects.clone();
            for dep in archived_dependencies(graph, ix) {
                for unit in units_for(graph.target(dep)) {
                    if !objects.contains(&unit.object) {
                        objects.push(unit.object);
                    }
                }
            }
            Some(LinkStep::Archive { objects, output })
        }
        ArtifactStep::LinkExecutable | ArtifactStep::LinkShared => {
            let mut lib_dirs = Vec::new();
            let mut libs = Vec::new();
            for lib in linked_libraries(graph, ix) {
                let lib = graph.target(lib);
                if let Some(artifact) = lib.output_path(os) {
                    library_artifacts.push(artifact);
                }
                let dir = lib.output_dir();
                if !lib_dirs.contains(&dir) {
                    lib_dirs.push(dir);
                }
                if !libs.contains(&lib.output_name) {
                    libs.push(lib.output_name.clone());
                }
            }
            let mut flags = toolchain.default_link_flags(build_type);
            flags.extend(effective.link.iter().cloned());
            Some(LinkStep::Link {
                objects: objects.clone(),
                output,
                flags: dedup(flags),
                lib_dirs,
                libs,
                shared: target.rules().artifact == ArtifactStep::LinkShared,
            })
        }
    });

    let mut plan = TargetPlan {
        name: target.name.clone(),
        kind: target.kind,
        root: target.root_dir.clone(),
        deps: graph
            .dependencies(ix)
            .into_iter()
            .filter_map(|dep| position.get(&dep).copied())
            .collect(),
        language: target.language(),
        units,
        compile_flags,
        include_dirs: effective.include_dirs,
        link,
        output,
        link_record: None,
    };
    plan.link_record = plan.record_link(toolchain, library_artifacts, target.dep_dir());
    plan
}

/// Compiled libraries linked by `ix`: its direct dependencies, looking
/// through header-only ones, in declaration order.
fn linked_libraries(graph: &DependencyGraph, ix: NodeIndex) -> Vec<NodeIndex> {
    let mut found = Vec::new();
    let mut pending: Vec<NodeIndex> = graph.dependencies(ix).into_iter().rev().collect();
    let mut visited = Vec::new();
    while let Some(dep) = pending.pop() {
        if visited.contains(&dep) {
            continue;
        }
        visited.push(dep);
        let kind = graph.target(dep).kind;
        if kind.is_linkable() {
            found.push(dep);
        } else if kind.is_header_only() {
            pending.extend(graph.dependencies(dep).into_iter().rev());
        }
    }
    found
}

/// Static libraries whose objects go into the archive of `ix`.
fn archived_dependencies(graph: &DependencyGraph, ix: NodeIndex) -> Vec<NodeIndex> {
    let mut found = Vec::new();
    let mut pending: Vec<NodeIndex> = graph.dependencies(ix).into_iter().rev().collect();
    while let Some(dep) = pending.pop() {
        if found.contains(&dep) {
            continue;
        }
        match graph.target(dep).kind {
            TargetKind::StaticLibrary => {
                found.push(dep);
                pending.extend(graph.dependencies(dep).into_iter().rev());
            }
            TargetKind::HeaderOnly => pending.extend(graph.dependencies(dep).into_iter().rev()),
            _ => {}
        }
    }
    found
}

fn dedup(flags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(flags.len());
    for flag in flags {
        if !out.contains(&flag) {
            out.push(flag);
        }
    }
    out
}

/// compile_commands.json entry.
#[derive(Debug, Serialize)]
struct CompileCommand {
    directory: String,
    file: String,
    arguments: Vec<String>,
    output: String,
}

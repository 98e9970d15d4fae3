//! Implementation of `clinker build`.

use anyhow::Result;

use crate::builder::executor::{BuildExecutor, MessageFormat};
use crate::builder::plan::BuildPlan;
use crate::builder::scheduler::BuildReport;
use crate::builder::toolchain::{detect_toolchain, Toolchain};
use crate::core::build_type::BuildType;
use crate::ops::resolve::{
    load_project_config, resolve_with_config, ResolveOptions, ResolvedProject,
};
use crate::util::context::GlobalContext;

/// File name of the compilation database, written into the build root.
pub const COMPILE_COMMANDS: &str = "compile_commands.json";

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Root targets (empty = the root project's targets)
    pub targets: Vec<String>,

    /// Build every target, subprojects included
    pub all: bool,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    pub build_type: Option<BuildType>,

    /// Recompile and relink everything
    pub force: bool,

    /// Emit compile_commands.json
    pub emit_compile_commands: bool,

    /// Stop after planning
    pub plan_only: bool,

    pub message_format: MessageFormat,

    /// Verbose output
    pub verbose: bool,
}

/// Build result.
#[derive(Debug)]
pub struct BuildResult {
    pub plan: BuildPlan,

    /// `None` when only planning
    pub report: Option<BuildReport>,
}

impl BuildResult {
    /// Planning succeeded, or every target built cleanly.
    pub fn success(&self) -> bool {
        self.report.as_ref().map_or(true, BuildReport::success)
    }
}

/// Build the project around the context's working directory.
pub fn build(ctx: &GlobalContext, opts: &BuildOptions) -> Result<BuildResult> {
    // The toolchain comes first: a missing compiler is reported before
    // any manifest or graph problem.
    let config = load_project_config(ctx)?;
    let toolchain = detect_toolchain(&config.toolchain)?;
    tracing::debug!(
        "using {} toolchain (cc: {}, c++: {})",
        toolchain.family,
        toolchain.cc.display(),
        toolchain.cxx.display()
    );

    let resolved = resolve_with_config(
        ctx,
        config,
        &ResolveOptions {
            build_type: opts.build_type,
        },
    )?;

    build_with(&resolved, &toolchain, opts)
}

/// Build an already resolved project with `toolchain`.
pub fn build_with(
    resolved: &ResolvedProject,
    toolchain: &dyn Toolchain,
    opts: &BuildOptions,
) -> Result<BuildResult> {
    let build_set = resolved.select(&opts.targets, opts.all)?;
    let mut plan = BuildPlan::new(
        &resolved.graph,
        &resolved.surfaces,
        &build_set,
        toolchain,
        resolved.project.build_type,
        opts.force,
    );

    tracing::info!(
        "{} target(s), {} of {} unit(s) to compile ({})",
        plan.targets.len(),
        plan.stale_unit_count(),
        plan.unit_count(),
        plan.build_type
    );

    if opts.emit_compile_commands || resolved.config.build.emit_compile_commands {
        let path = resolved.project.build_root.join(COMPILE_COMMANDS);
        plan.emit_compile_commands(toolchain, &path)?;
    }

    if opts.plan_only {
        return Ok(BuildResult { plan, report: None });
    }

    let jobs = opts
        .jobs
        .or(resolved.config.build.jobs)
        .unwrap_or_else(default_jobs);

    let report = BuildExecutor::new(toolchain, jobs)
        .force(opts.force)
        .verbose(opts.verbose)
        .message_format(opts.message_format)
        .execute(&mut plan)?;

    Ok(BuildResult {
        plan,
        report: Some(report),
    })
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

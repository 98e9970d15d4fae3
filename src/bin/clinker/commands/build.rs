//! `clinker build` command

use anyhow::Result;
use thiserror::Error;

use crate::cli::BuildArgs;
use clinker::builder::{BuildReport, MessageFormat, TargetState};
use clinker::ops::{build, BuildOptions};
use clinker::util::diagnostic::{emit, Diagnostic};
use clinker::util::GlobalContext;

/// The build ran but some targets did not link.
#[derive(Debug, Error)]
#[error("build failed: {failed} of {total} target(s) did not build")]
pub struct BuildFailed {
    pub failed: usize,
    pub total: usize,
}

pub fn execute(args: BuildArgs, verbose: bool, color: bool) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let format = MessageFormat::from(args.message_format);
    let opts = BuildOptions {
        build_type: args.build_type(),
        targets: args.target,
        all: args.all,
        jobs: args.jobs,
        force: args.force,
        emit_compile_commands: args.emit_compile_commands,
        plan_only: args.plan,
        message_format: format,
        verbose,
    };

    let result = build(&ctx, &opts)?;

    let Some(report) = result.report else {
        println!("{}", result.plan.to_json()?);
        return Ok(());
    };

    if format == MessageFormat::Human {
        print_summary(&report, color);
    }

    if report.success() {
        Ok(())
    } else {
        let failed = report
            .targets
            .iter()
            .filter(|t| t.state != TargetState::Linked)
            .count();
        Err(BuildFailed {
            failed,
            total: report.targets.len(),
        }
        .into())
    }
}

fn print_summary(report: &BuildReport, color: bool) {
    for (target, errors) in &report.compile_errors {
        let mut diagnostic = Diagnostic::error(format!(
            "{} unit(s) of `{}` failed to compile",
            errors.len(),
            target
        ));
        for error in errors {
            diagnostic = diagnostic.with_note(error.as_str());
        }
        emit(&diagnostic, color);
    }

    for (target, errors) in &report.link_errors {
        let mut diagnostic = Diagnostic::error(format!("failed to link `{}`", target));
        for error in errors {
            diagnostic = diagnostic.with_note(error.as_str());
        }
        emit(&diagnostic, color);
    }

    for target in &report.targets {
        if let Some(artifact) = &target.artifact {
            if report.linked_targets.contains(&target.name) {
                eprintln!("    Finished `{}` -> {}", target.name, artifact.display());
            }
        }
    }

    if report.compiled_units == 0 && report.linked_targets.is_empty() && report.success() {
        eprintln!("    Fresh {} target(s)", report.targets.len());
    } else {
        eprintln!(
            "    Compiled {} unit(s), linked {} target(s)",
            report.compiled_units,
            report.linked_targets.len()
        );
    }
}

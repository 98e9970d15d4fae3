//! Runs a plan through the scheduler and shows progress.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::builder::events::BuildEvent;
use crate::builder::plan::BuildPlan;
use crate::builder::scheduler::{BuildReport, Scheduler};
use crate::builder::toolchain::Toolchain;

/// How build progress is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    /// Progress bar on stderr
    #[default]
    Human,
    /// One JSON event per line on stdout
    Json,
}

pub struct BuildExecutor<'a> {
    toolchain: &'a dyn Toolchain,
    jobs: usize,
    force: bool,
    verbose: bool,
    format: MessageFormat,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, jobs: usize) -> Self {
        BuildExecutor {
            toolchain,
            jobs,
            force: false,
            verbose: false,
            format: MessageFormat::Human,
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Print each command line instead of drawing a progress bar.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn message_format(mut self, format: MessageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn execute(&self, plan: &mut BuildPlan) -> Result<BuildReport> {
        let scheduler = Scheduler::new(self.toolchain, self.jobs).force(self.force);

        match self.format {
            MessageFormat::Json => scheduler.run(plan, &mut |event: &BuildEvent| {
                println!("{}", event.to_json())
            }),
            MessageFormat::Human => {
                let total = plan.stale_unit_count() + plan.targets.len();
                let pb = self.progress_bar(total);
                let report = scheduler.run(plan, &mut |event: &BuildEvent| {
                    if let Some(pb) = &pb {
                        report_progress(pb, event);
                    }
                })?;

                if let Some(pb) = pb {
                    pb.finish_and_clear();
                }
                Ok(report)
            }
        }
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if self.verbose || total <= 1 {
            return None;
        }
        let pb = ProgressBar::new(total as u64);
        // Fall back to the default style if the template is rejected
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }
}

fn report_progress(pb: &ProgressBar, event: &BuildEvent) {
    match event {
        BuildEvent::UnitCompiled { source, .. } => {
            pb.inc(1);
            if let Some(name) = source.file_name() {
                pb.set_message(name.to_string_lossy().into_owned());
            }
        }
        BuildEvent::TargetState { target, state } => {
            if state.is_final() {
                pb.inc(1);
            }
            pb.set_message(format!("{} ({})", target, state));
        }
        BuildEvent::CompilerError { target, .. } => {
            pb.println(format!("error: build step of `{}` failed", target));
        }
        BuildEvent::BuildStarted { .. } | BuildEvent::BuildFinished { .. } => {}
    }
}

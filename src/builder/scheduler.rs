//! Dependency-ordered build scheduling.
//!
//! Every target in the plan walks a small state machine:
//!
//! ```text
//! Pending -> Compiling -> Compiled | CompiledWithFailures -> Linking -> Linked | LinkFailed
//! ```
//!
//! A target starts compiling once all of its dependencies have finished
//! compiling, and starts linking once all of its dependencies are Linked or
//! LinkFailed. Stale units and link steps run as jobs on a bounded rayon
//! pool and report back over a channel. All state transitions happen on the
//! calling thread.
//!
//! Failures are collected, not propagated: a failed unit does not stop its
//! siblings, and a target with failed units still attempts its link.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::builder::events::BuildEvent;
use crate::builder::fingerprint::LinkStaleness;
use crate::builder::plan::BuildPlan;
use crate::builder::toolchain::{
    ArchiveInput, CompileInput, DepfileInput, LinkInput, ToolOutcome, Toolchain,
};

/// Build state of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetState {
    Pending,
    Compiling,
    Compiled,
    CompiledWithFailures,
    Linking,
    Linked,
    LinkFailed,
}

impl TargetState {
    /// The compile phase is over (successfully or not).
    pub fn compile_finished(&self) -> bool {
        !matches!(self, TargetState::Pending | TargetState::Compiling)
    }

    /// Linked or LinkFailed.
    pub fn is_final(&self) -> bool {
        matches!(self, TargetState::Linked | TargetState::LinkFailed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Pending => "pending",
            TargetState::Compiling => "compiling",
            TargetState::Compiled => "compiled",
            TargetState::CompiledWithFailures => "compiled with failures",
            TargetState::Linking => "linking",
            TargetState::Linked => "linked",
            TargetState::LinkFailed => "link failed",
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
    pub name: String,
    pub state: TargetState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

/// Result of running a build plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Targets in plan order
    pub targets: Vec<TargetOutcome>,
    /// Target name -> diagnostics of failed units
    pub compile_errors: BTreeMap<String, Vec<String>>,
    /// Target name -> diagnostics of its failed link
    pub link_errors: BTreeMap<String, Vec<String>>,
    /// Units compiled successfully in this build
    pub compiled_units: usize,
    /// Targets archived or linked in this build
    pub linked_targets: Vec<String>,
}

impl BuildReport {
    pub fn success(&self) -> bool {
        self.compile_errors.is_empty()
            && self.link_errors.is_empty()
            && self
                .targets
                .iter()
                .all(|t| t.state == TargetState::Linked)
    }

    pub fn state(&self, name: &str) -> Option<TargetState> {
        self.targets.iter().find(|t| t.name == name).map(|t| t.state)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &PathBuf> {
        self.targets.iter().filter_map(|t| t.artifact.as_ref())
    }
}

/// Work handed to the pool.
enum Job {
    Unit {
        target: usize,
        unit: usize,
        depfile: DepfileInput,
        compile: CompileInput,
    },
    Archive {
        target: usize,
        input: ArchiveInput,
    },
    Link {
        target: usize,
        input: LinkInput,
    },
}

enum JobResult {
    Unit {
        target: usize,
        unit: usize,
        /// The failed dependency scan, or the compile
        outcome: ToolOutcome,
    },
    Link {
        target: usize,
        outcome: ToolOutcome,
    },
}

fn run_job(job: Job, toolchain: &dyn Toolchain) -> JobResult {
    match job {
        Job::Unit {
            target,
            unit,
            depfile,
            compile,
        } => {
            let scan = toolchain.generate_dependency_file(&depfile);
            let outcome = if scan.success {
                toolchain.compile(&compile)
            } else {
                scan
            };
            JobResult::Unit {
                target,
                unit,
                outcome,
            }
        }
        Job::Archive { target, input } => JobResult::Link {
            target,
            outcome: toolchain.archive(&input),
        },
        Job::Link { target, input } => JobResult::Link {
            target,
            outcome: toolchain.link(&input),
        },
    }
}

/// Runs a [`BuildPlan`] on a bounded worker pool.
pub struct Scheduler<'a> {
    toolchain: &'a dyn Toolchain,
    jobs: usize,
    force: bool,
}

impl<'a> Scheduler<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, jobs: usize) -> Self {
        Scheduler {
            toolchain,
            jobs: jobs.max(1),
            force: false,
        }
    }

    /// Relink every target even when its output looks current.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Build everything in `plan`, reporting progress to `on_event`.
    ///
    /// Units of `plan` are updated with their compile results.
    pub fn run(&self, plan: &mut BuildPlan, on_event: &mut dyn FnMut(&BuildEvent)) -> Result<BuildReport> {
        let started = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("clinker-worker-{}", i))
            .build()
            .context("failed to start worker pool")?;

        on_event(&BuildEvent::started(
            plan.build_type.as_str(),
            plan.targets.len(),
            plan.stale_unit_count(),
        ));

        let mut coordinator = Coordinator::new(plan, self.force);
        let toolchain = self.toolchain;
        let (tx, rx) = mpsc::channel::<JobResult>();

        pool.in_place_scope(|scope| {
            let mut in_flight = 0usize;
            loop {
                for job in coordinator.advance(on_event) {
                    let tx = tx.clone();
                    in_flight += 1;
                    scope.spawn(move |_| {
                        // The receiver outlives every job
                        let _ = tx.send(run_job(job, toolchain));
                    });
                }

                if in_flight == 0 {
                    break;
                }

                match rx.recv() {
                    Ok(result) => {
                        in_flight -= 1;
                        coordinator.complete(result, on_event);
                    }
                    Err(_) => break,
                }
            }
        });

        let report = coordinator.finish()?;

        on_event(&BuildEvent::BuildFinished {
            success: report.success(),
            duration_ms: started.elapsed().as_millis() as u64,
            compiled_units: report.compiled_units as u64,
            linked_targets: report.linked_targets.len() as u64,
        });

        Ok(report)
    }
}

/// State machine over the targets of one plan.
struct Coordinator<'p> {
    plan: &'p mut BuildPlan,
    states: Vec<TargetState>,
    /// Units of each target still running
    outstanding: Vec<usize>,
    /// Any unit of the target was compiled in this build
    recompiled: Vec<bool>,
    /// The target's artifact was rewritten in this build
    relinked: Vec<bool>,
    force: bool,
    report: BuildReport,
}

impl<'p> Coordinator<'p> {
    fn new(plan: &'p mut BuildPlan, force: bool) -> Self {
        let n = plan.targets.len();
        Coordinator {
            plan,
            states: vec![TargetState::Pending; n],
            outstanding: vec![0; n],
            recompiled: vec![false; n],
            relinked: vec![false; n],
            force,
            report: BuildReport::default(),
        }
    }

    fn set_state(&mut self, t: usize, state: TargetState, on_event: &mut dyn FnMut(&BuildEvent)) {
        let name = &self.plan.targets[t].name;
        tracing::debug!("{}: {} -> {}", name, self.states[t], state);
        self.states[t] = state;
        on_event(&BuildEvent::state(name.as_str(), state));
    }

    /// Move every target that can move, returning the jobs to start.
    fn advance(&mut self, on_event: &mut dyn FnMut(&BuildEvent)) -> Vec<Job> {
        let mut jobs = Vec::new();
        let mut progressed = true;

        while progressed {
            progressed = false;
            for t in 0..self.plan.targets.len() {
                match self.states[t] {
                    TargetState::Pending if self.deps_all(t, TargetState::compile_finished) => {
                        self.start_compile(t, &mut jobs, on_event);
                        progressed = true;
                    }
                    TargetState::Compiled | TargetState::CompiledWithFailures
                        if self.deps_all(t, TargetState::is_final) =>
                    {
                        self.start_link(t, &mut jobs, on_event);
                        progressed = true;
                    }
                    _ => {}
                }
            }
        }

        jobs
    }

    fn deps_all(&self, t: usize, pred: fn(&TargetState) -> bool) -> bool {
        self.plan.targets[t]
            .deps
            .iter()
            .all(|&d| pred(&self.states[d]))
    }

    fn start_compile(&mut self, t: usize, jobs: &mut Vec<Job>, on_event: &mut dyn FnMut(&BuildEvent)) {
        if self.plan.targets[t].kind.is_header_only() {
            self.set_state(t, TargetState::Compiled, on_event);
            return;
        }

        self.set_state(t, TargetState::Compiling, on_event);

        let target = &self.plan.targets[t];
        let before = jobs.len();
        for (u, unit) in target.stale_units() {
            jobs.push(Job::Unit {
                target: t,
                unit: u,
                depfile: target.depfile_input(unit),
                compile: target.compile_input(unit),
            });
        }
        let started = jobs.len() - before;

        self.outstanding[t] = started;
        self.recompiled[t] = started > 0;
        if started == 0 {
            tracing::debug!("{}: all units up to date", self.plan.targets[t].name);
            self.set_state(t, TargetState::Compiled, on_event);
        }
    }

    fn start_link(&mut self, t: usize, jobs: &mut Vec<Job>, on_event: &mut dyn FnMut(&BuildEvent)) {
        let dep_relinked = self.plan.targets[t].deps.iter().any(|&d| self.relinked[d]);
        let target = &self.plan.targets[t];

        if target.kind.is_header_only() {
            // Dependents see through header-only targets
            self.relinked[t] = dep_relinked;
            self.set_state(t, TargetState::Linked, on_event);
            return;
        }

        let staleness = match &target.link_record {
            Some(record) => record.check(self.force),
            None => LinkStaleness::Fresh,
        };
        if !(self.recompiled[t] || dep_relinked || staleness.is_stale()) {
            tracing::debug!("{}: artifact up to date", target.name);
            self.set_state(t, TargetState::Linked, on_event);
            return;
        }
        if staleness.is_stale() {
            tracing::debug!("{}: artifact is stale ({})", target.name, staleness);
        }

        let job = if let Some(input) = target.archive_input() {
            Job::Archive { target: t, input }
        } else if let Some(input) = target.link_input() {
            Job::Link { target: t, input }
        } else {
            self.set_state(t, TargetState::Linked, on_event);
            return;
        };

        jobs.push(job);
        self.set_state(t, TargetState::Linking, on_event);
    }

    fn complete(&mut self, result: JobResult, on_event: &mut dyn FnMut(&BuildEvent)) {
        match result {
            JobResult::Unit {
                target: t,
                unit: u,
                outcome,
            } => {
                let name = self.plan.targets[t].name.clone();
                let unit = &mut self.plan.targets[t].units[u];
                unit.compiled = outcome.success;
                on_event(&BuildEvent::UnitCompiled {
                    target: name.clone(),
                    source: unit.source.clone(),
                    object: unit.object.clone(),
                    success: outcome.success,
                });

                if outcome.success {
                    self.report.compiled_units += 1;
                } else {
                    let diagnostic = outcome.diagnostic();
                    tracing::debug!("{}: {} failed", name, unit.source.display());
                    unit.failure = Some(diagnostic.clone());
                    on_event(&BuildEvent::error(
                        name.as_str(),
                        Some(unit.source.clone()),
                        diagnostic.as_str(),
                    ));
                    self.report
                        .compile_errors
                        .entry(name)
                        .or_default()
                        .push(diagnostic);
                }

                self.outstanding[t] -= 1;
                if self.outstanding[t] == 0 {
                    let failed = self.plan.targets[t].units.iter().any(|u| u.failure.is_some());
                    let state = if failed {
                        TargetState::CompiledWithFailures
                    } else {
                        TargetState::Compiled
                    };
                    self.set_state(t, state, on_event);
                }
            }
            JobResult::Link { target: t, outcome } => {
                let name = self.plan.targets[t].name.clone();
                if let Some(record) = &self.plan.targets[t].link_record {
                    let kept = if outcome.success {
                        record.save()
                    } else {
                        record.discard().map_err(anyhow::Error::from)
                    };
                    if let Err(e) = kept {
                        tracing::warn!(
                            "{}: failed to update {}: {:#}",
                            name,
                            record.stamp.display(),
                            e
                        );
                    }
                }
                if outcome.success {
                    self.relinked[t] = true;
                    self.report.linked_targets.push(name);
                    self.set_state(t, TargetState::Linked, on_event);
                } else {
                    let diagnostic = outcome.diagnostic();
                    on_event(&BuildEvent::error(name.as_str(), None, diagnostic.as_str()));
                    self.report
                        .link_errors
                        .entry(name)
                        .or_default()
                        .push(diagnostic);
                    self.set_state(t, TargetState::LinkFailed, on_event);
                }
            }
        }
    }

    fn finish(self) -> Result<BuildReport> {
        let Coordinator {
            plan,
            states,
            mut report,
            ..
        } = self;

        if let Some(t) = states.iter().position(|s| !s.is_final()) {
            bail!(
                "build stopped with target `{}` {}",
                plan.targets[t].name,
                states[t]
            );
        }

        report.targets = plan
            .targets
            .iter()
            .zip(&states)
            .map(|(target, &state)| TargetOutcome {
                name: target.name.clone(),
                state,
                artifact: target.output.clone().filter(|_| state == TargetState::Linked),
            })
            .collect();

        Ok(report)
    }
}

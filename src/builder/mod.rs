//! C/C++ build engine.
//!
//! This module turns target descriptors into a validated dependency graph,
//! propagates flags across it, decides which translation units are stale,
//! and schedules compiles and links through a [`Toolchain`].

pub mod depfile;
pub mod events;
pub mod executor;
pub mod fingerprint;
pub mod graph;
pub mod plan;
pub mod scheduler;
pub mod surface_resolver;
pub mod toolchain;
pub mod unit;

pub use events::BuildEvent;
pub use executor::{BuildExecutor, MessageFormat};
pub use graph::{ConfigurationError, DependencyGraph, Violation};
pub use plan::{BuildPlan, LinkStep, TargetPlan};
pub use scheduler::{BuildReport, Scheduler, TargetState};
pub use surface_resolver::{EffectiveFlags, ResolvedSurfaces, SurfaceResolver};
pub use toolchain::{
    detect_toolchain, CommandSpec, GccToolchain, ToolOutcome, Toolchain, ToolchainError,
    ToolchainPlatform,
};
pub use unit::TranslationUnit;

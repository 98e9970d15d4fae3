//! Clinker - an incremental build orchestrator for C and C++ targets
//!
//! This crate provides the library side of Clinker: the target model,
//! dependency graph resolution, scoped flag propagation, incremental
//! staleness analysis, and the dependency-ordered build scheduler.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities for Clinker unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a recording toolchain that never spawns a compiler, plus
/// on-disk project fixtures.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    build_type::BuildType, project::Project, surface::Surface, target::TargetDescriptor,
    target::TargetKind,
};

pub use builder::{DependencyGraph, SurfaceResolver};
pub use util::context::GlobalContext;

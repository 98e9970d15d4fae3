//! High-level operations.
//!
//! This module contains the implementation of Clinker commands.

pub mod build;
pub mod clean;
pub mod resolve;

pub use build::{build, build_with, BuildOptions, BuildResult, COMPILE_COMMANDS};
pub use clean::{clean, CleanOptions};
pub use resolve::{resolve_project, ResolveOptions, ResolvedProject};

//! Command implementations

pub mod build;
pub mod clean;
pub mod flags;
pub mod graph;
pub mod toolchain;

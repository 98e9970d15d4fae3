//! Core data structures for Clinker.
//!
//! This module contains the foundational types used throughout Clinker:
//! - Target descriptors and the per-kind rule table
//! - Declared flag and include scopes (surfaces)
//! - Build types and host platform information
//! - Manifest parsing and project flattening

pub mod build_type;
pub mod manifest;
pub mod platform;
pub mod project;
pub mod surface;
pub mod target;

pub use build_type::BuildType;
pub use manifest::{Manifest, ManifestError, MANIFEST_NAME};
pub use platform::TargetOs;
pub use project::{Project, ProjectOptions};
pub use surface::Surface;
pub use target::{TargetDescriptor, TargetKind};

//! Target definitions - what gets built.
//!
//! A target is one named build unit: an executable, a static library,
//! a shared library, or a header-only library.

mod core;
mod language;

pub use self::core::{ArtifactStep, KindRules, Propagation, TargetDescriptor, TargetKind};
pub use self::language::{
    is_header_file, is_source_file, CppStandard, Language,
};

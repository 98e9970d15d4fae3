//! Surface contract - the flags and include directories a target declares.
//!
//! Every target declares compile and link flags in three scopes and
//! include directories in two:
//!
//! - `private`: applied to the target's own compilation or link only
//! - `public`: applied to the target itself and forwarded to consumers
//! - `interface`: forwarded to consumers only, never applied locally
//!
//! Include directories have no interface tier. What actually reaches a
//! consumer is decided by the propagation rules of the target kind, see
//! [`crate::builder::surface_resolver`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Declared flags and include directories of one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    /// Compiler flags
    #[serde(default)]
    pub compile: ScopedFlags,

    /// Linker flags
    #[serde(default)]
    pub link: ScopedFlags,

    /// Include directories
    #[serde(default)]
    pub include: ScopedIncludes,
}

/// Flags split by visibility scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedFlags {
    #[serde(default)]
    pub private: Vec<String>,

    #[serde(default)]
    pub public: Vec<String>,

    #[serde(default)]
    pub interface: Vec<String>,
}

impl ScopedFlags {
    /// Check if no flags are declared in any scope.
    pub fn is_empty(&self) -> bool {
        self.private.is_empty() && self.public.is_empty() && self.interface.is_empty()
    }
}

/// Include directories split by visibility scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedIncludes {
    #[serde(default)]
    pub private: Vec<PathBuf>,

    #[serde(default)]
    pub public: Vec<PathBuf>,
}

/// Flags a target hands to its consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportedFlags {
    pub public: Vec<String>,
    pub interface: Vec<String>,
}

impl Surface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Surface::default()
    }

    /// Check if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.compile.is_empty()
            && self.link.is_empty()
            && self.include.private.is_empty()
            && self.include.public.is_empty()
    }
}

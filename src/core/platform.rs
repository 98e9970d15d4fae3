//! Host platform identification.
//!
//! Output affixes and a few platform-specific flags depend on the
//! operating system the artifacts are built for.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating system family that determines artifact naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    /// Linux and other ELF-based Unix systems
    Linux,
    /// macOS (Mach-O, `.dylib`)
    MacOs,
    /// Windows (`.exe`, `.dll`, `.lib`)
    Windows,
}

impl TargetOs {
    /// Detect the host operating system.
    pub fn host() -> Self {
        match std::env::consts::OS {
            "macos" | "ios" => TargetOs::MacOs,
            "windows" => TargetOs::Windows,
            _ => TargetOs::Linux,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOs::Linux => "linux",
            TargetOs::MacOs => "macos",
            TargetOs::Windows => "windows",
        }
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_matches_consts() {
        let host = TargetOs::host();
        if cfg!(target_os = "windows") {
            assert_eq!(host, TargetOs::Windows);
        } else if cfg!(target_os = "macos") {
            assert_eq!(host, TargetOs::MacOs);
        } else {
            assert_eq!(host, TargetOs::Linux);
        }
    }
}

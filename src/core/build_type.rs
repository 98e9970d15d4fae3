//! Build types.
//!
//! A build type selects the toolchain's default flags and the
//! `compile_<build type>` / `link_<build type>` manifest variants.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of build being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    /// Warnings only, no optimization settings
    #[default]
    Default,
    /// Optimized, assertions disabled
    Release,
    /// Optimized with debug info
    RelWithDebInfo,
    /// Unoptimized with debug info and sanitizers
    Debug,
    /// Debug plus coverage instrumentation
    Coverage,
}

impl BuildType {
    /// All build types, in a stable order.
    pub const ALL: [BuildType; 5] = [
        BuildType::Default,
        BuildType::Release,
        BuildType::RelWithDebInfo,
        BuildType::Debug,
        BuildType::Coverage,
    ];

    /// Lowercase name, used for build directories and flag variant keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Default => "default",
            BuildType::Release => "release",
            BuildType::RelWithDebInfo => "relwithdebinfo",
            BuildType::Debug => "debug",
            BuildType::Coverage => "coverage",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildType {
    type Err = BuildTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        BuildType::ALL
            .into_iter()
            .find(|bt| bt.as_str() == lower)
            .ok_or_else(|| BuildTypeParseError(s.to_string()))
    }
}

/// Error when parsing a build type name.
#[derive(Debug, Clone, Error)]
#[error("unknown build type `{0}` (expected one of: default, release, relwithdebinfo, debug, coverage)")]
pub struct BuildTypeParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Release".parse::<BuildType>().unwrap(), BuildType::Release);
        assert_eq!(
            "RelWithDebInfo".parse::<BuildType>().unwrap(),
            BuildType::RelWithDebInfo
        );
        assert_eq!("DEBUG".parse::<BuildType>().unwrap(), BuildType::Debug);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "fast".parse::<BuildType>().unwrap_err();
        assert!(err.to_string().contains("fast"));
    }

    #[test]
    fn test_default_is_default() {
        assert_eq!(BuildType::default(), BuildType::Default);
        assert_eq!(BuildType::default().to_string(), "default");
    }
}

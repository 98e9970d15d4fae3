//! Source languages and C++ dialects.

use std::fmt;
use std::path::Path;

use serde::Serialize;

/// Extensions compiled as translation units.
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++"];

/// Extensions picked up from public include directories.
pub const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "h++"];

/// Which compiler driver handles a file or a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    #[default]
    #[serde(rename = "c++")]
    Cxx,
}

impl Language {
    /// `None` for anything that is not a translation unit.
    pub fn from_path(path: &Path) -> Option<Language> {
        match extension(path)? {
            "c" => Some(Language::C),
            ext if SOURCE_EXTENSIONS.contains(&ext) => Some(Language::Cxx),
            _ => None,
        }
    }
}

pub fn is_source_file(path: &Path) -> bool {
    extension(path).is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

pub fn is_header_file(path: &Path) -> bool {
    extension(path).is_some_and(|e| HEADER_EXTENSIONS.contains(&e))
}

fn extension(path: &Path) -> Option<&str> {
    path.extension()?.to_str()
}

/// A `-std=` dialect for C++ compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CppStandard {
    Cpp11,
    Cpp14,
    Cpp17,
    Cpp20,
    Cpp23,
}

impl CppStandard {
    /// The order dialects are probed in.
    pub const NEWEST_FIRST: [CppStandard; 5] = [
        CppStandard::Cpp23,
        CppStandard::Cpp20,
        CppStandard::Cpp17,
        CppStandard::Cpp14,
        CppStandard::Cpp11,
    ];

    fn year(self) -> u8 {
        match self {
            CppStandard::Cpp11 => 11,
            CppStandard::Cpp14 => 14,
            CppStandard::Cpp17 => 17,
            CppStandard::Cpp20 => 20,
            CppStandard::Cpp23 => 23,
        }
    }

    pub fn as_flag(&self) -> String {
        format!("-std={}", self)
    }
}

impl fmt::Display for CppStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c++{}", self.year())
    }
}

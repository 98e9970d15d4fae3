//! Toolchain detection functions.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::util::config::ToolchainSettings;
use crate::util::process::{find_executable, ProcessBuilder};

use super::gcc::probe_cxx_standard;
use super::{GccToolchain, ToolchainPlatform};

/// The build environment lacks a usable toolchain.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolchainError {
    #[error("no C compiler found")]
    #[diagnostic(
        code(clinker::toolchain::no_compiler),
        help("install gcc or clang, or set CC/CXX/AR (or [toolchain] in .clinker/config.toml)")
    )]
    NoCompiler,

    #[error("configured {tool} `{}` not found", .path.display())]
    #[diagnostic(code(clinker::toolchain::not_found))]
    NotFound { tool: &'static str, path: PathBuf },

    #[error("no archiver found (tried ar, llvm-ar)")]
    #[diagnostic(code(clinker::toolchain::no_archiver), help("set AR or [toolchain] ar"))]
    NoArchiver,
}

/// Detect the available toolchain.
///
/// `settings` come from the merged tool configuration; `CC`, `CXX` and `AR`
/// override them. Anything still unset is searched for in PATH. The C++
/// dialect is probed here, once.
pub fn detect_toolchain(settings: &ToolchainSettings) -> Result<GccToolchain, ToolchainError> {
    let settings = settings.clone().with_env_overrides();

    let cc = match settings.cc {
        Some(cc) => resolve("C compiler", &cc)?,
        None => ["cc", "gcc", "clang"]
            .iter()
            .find_map(find_executable)
            .ok_or(ToolchainError::NoCompiler)?,
    };

    let cxx = match settings.cxx {
        Some(cxx) => resolve("C++ compiler", &cxx)?,
        None => ["c++", "g++", "clang++"]
            .iter()
            .find_map(find_executable)
            .unwrap_or_else(|| GccToolchain::infer_cxx(&cc)),
    };

    let ar = match settings.ar {
        Some(ar) => resolve("archiver", &ar)?,
        None => ["ar", "llvm-ar"]
            .iter()
            .find_map(find_executable)
            .ok_or(ToolchainError::NoArchiver)?,
    };

    let family = detect_compiler_family(&cc);
    let cxx_std = probe_cxx_standard(&cxx);

    tracing::debug!(
        "toolchain: cc={} cxx={} ar={} family={} std={:?}",
        cc.display(),
        cxx.display(),
        ar.display(),
        family,
        cxx_std
    );

    Ok(GccToolchain::new(cc, cxx, ar, family).with_cxx_standard(cxx_std))
}

/// Resolve a configured tool given as a path or a bare name.
fn resolve(tool: &'static str, configured: &Path) -> Result<PathBuf, ToolchainError> {
    if configured.is_file() {
        return Ok(configured.to_path_buf());
    }
    find_executable(configured).ok_or_else(|| ToolchainError::NotFound {
        tool,
        path: configured.to_path_buf(),
    })
}

/// Detect whether the compiler is GCC, Clang, or Apple Clang.
pub fn detect_compiler_family(cc: &Path) -> ToolchainPlatform {
    let version = ProcessBuilder::new(cc)
        .arg("--version")
        .exec()
        .map(|out| String::from_utf8_lossy(&out.stdout).to_lowercase())
        .unwrap_or_default();

    if let Some(family) = family_from_version(&version) {
        return family;
    }

    // Fall back to the binary name
    let name = cc
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();
    if name.contains("clang") {
        ToolchainPlatform::Clang
    } else {
        ToolchainPlatform::Gcc
    }
}

fn family_from_version(version: &str) -> Option<ToolchainPlatform> {
    if version.contains("apple") && version.contains("clang") {
        Some(ToolchainPlatform::AppleClang)
    } else if version.contains("clang") {
        Some(ToolchainPlatform::Clang)
    } else if version.contains("gcc") || version.contains("free software foundation") {
        Some(ToolchainPlatform::Gcc)
    } else {
        None
    }
}

//! Configuration file support for Clinker.
//!
//! Settings come from `~/.clinker/config.toml`, then `.clinker/config.toml`
//! in the project root, each overriding the last. For the tools, `CC`, `CXX`
//! and `AR` in the environment override both files.
//!
//! ```toml
//! [build]
//! jobs = 8
//! build_type = "debug"
//! build_dir = "out"
//! emit_compile_commands = true
//!
//! [toolchain]
//! cc = "/usr/bin/clang"
//! cxx = "/usr/bin/clang++"
//! ar = "/usr/bin/llvm-ar"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_DIR: &str = ".clinker";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildConfig,
    pub toolchain: ToolchainSettings,
}

/// `[build]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Worker count; the CPU count when unset
    pub jobs: Option<usize>,
    pub build_type: Option<String>,

    /// Build directory, relative to the project root
    pub build_dir: Option<PathBuf>,

    /// Write `compile_commands.json` on every build
    pub emit_compile_commands: bool,
}

/// `[toolchain]`: explicit tools, by name or path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    pub cc: Option<PathBuf>,
    pub cxx: Option<PathBuf>,
    pub ar: Option<PathBuf>,
}

impl ToolchainSettings {
    /// Let non-blank `CC`, `CXX` and `AR` replace the configured tools.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (key, slot) in [
            ("CC", &mut self.cc),
            ("CXX", &mut self.cxx),
            ("AR", &mut self.ar),
        ] {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = Some(PathBuf::from(value));
            }
        }
    }
}

impl Config {
    /// Parse one configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        toml::from_str(&text).with_context(|| format!("`{}` is not valid TOML", path.display()))
    }

    /// Like [`Config::load`], but a missing file is empty and a broken one
    /// is skipped with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.is_file() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("ignoring configuration {}: {:#}", path.display(), e);
            Self::default()
        })
    }

    /// Layer `over` on top of `self`; whatever `over` sets wins.
    pub fn merge(&mut self, over: Config) {
        let build = &mut self.build;
        build.jobs = over.build.jobs.or(build.jobs);
        build.build_type = over.build.build_type.or(build.build_type.take());
        build.build_dir = over.build.build_dir.or(build.build_dir.take());
        build.emit_compile_commands |= over.build.emit_compile_commands;

        let tools = &mut self.toolchain;
        tools.cc = over.toolchain.cc.or(tools.cc.take());
        tools.cxx = over.toolchain.cxx.or(tools.cxx.take());
        tools.ar = over.toolchain.ar.or(tools.ar.take());
    }
}

/// Global defaults overlaid with the project file.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = global_path.map(Config::load_or_default).unwrap_or_default();
    config.merge(Config::load_or_default(project_path));
    config
}

/// `~/.clinker/config.toml`
pub fn global_config_path() -> Option<PathBuf> {
    let home = directories::BaseDirs::new()?;
    Some(home.home_dir().join(CONFIG_DIR).join(CONFIG_FILE))
}

/// `<root>/.clinker/config.toml`
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join(CONFIG_FILE)
}

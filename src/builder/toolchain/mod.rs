//! Compiler toolchains.
//!
//! A toolchain spells the compile, dependency-scan, link and archive
//! commands for one compiler family, and runs them. An ordinary compiler
//! failure is not an `Err`: the [`ToolOutcome`] carries the command line and
//! the tool's output so the scheduler can file it under the failing target.
//!
//! Tools are chosen from `CC`/`CXX`/`AR`, then `[toolchain]` in the
//! configuration files, then whatever gcc or clang is found on PATH.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::build_type::BuildType;
use crate::core::platform::TargetOs;
use crate::core::target::CppStandard;
use crate::util::fs;
use crate::util::process::{combined_output, ProcessBuilder};

mod detect;
mod gcc;

pub use detect::{detect_toolchain, ToolchainError};
pub use gcc::{probe_cxx_standard, GccToolchain};

pub use crate::core::target::Language;

/// A tool invocation that has been spelled but not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Program followed by its arguments, as written to
    /// `compile_commands.json`.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Shell-like rendering; arguments with spaces are single-quoted.
    pub fn display(&self) -> String {
        let quoted: Vec<String> = self
            .argv()
            .into_iter()
            .map(|a| {
                if a.contains(char::is_whitespace) {
                    format!("'{a}'")
                } else {
                    a
                }
            })
            .collect();
        quoted.join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&CommandSpec::display(self))
    }
}

/// One source file to one object file.
#[derive(Debug, Clone)]
pub struct CompileInput {
    pub source: PathBuf,
    pub object: PathBuf,
    /// Emitted as `-I` before `flags`.
    pub include_dirs: Vec<PathBuf>,
    pub flags: Vec<String>,
    /// C sources go to the C driver, everything else to the C++ one.
    pub language: Language,
}

/// Header listing for one source, written as a Make rule for `object`.
#[derive(Debug, Clone)]
pub struct DepfileInput {
    pub source: PathBuf,
    pub depfile: PathBuf,
    pub object: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub flags: Vec<String>,
    pub language: Language,
}

impl DepfileInput {
    /// Scan with exactly the include paths and flags of `input`.
    pub fn for_compile(input: &CompileInput, depfile: impl Into<PathBuf>) -> Self {
        DepfileInput {
            source: input.source.clone(),
            depfile: depfile.into(),
            object: input.object.clone(),
            include_dirs: input.include_dirs.clone(),
            flags: input.flags.clone(),
            language: input.language,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveInput {
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Objects and libraries into an executable, or a shared library when
/// `shared` is set.
#[derive(Debug, Clone)]
pub struct LinkInput {
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
    pub flags: Vec<String>,
    /// Searched for `libs`, emitted as `-L`.
    pub lib_dirs: Vec<PathBuf>,
    /// Bare library names, emitted as `-l`.
    pub libs: Vec<String>,
    pub shared: bool,
    /// C++ anywhere in the target means the C++ driver links it.
    pub language: Language,
}

/// What happened when a tool ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub command: String,
    /// Everything the tool printed, stdout first.
    pub report: String,
}

impl ToolOutcome {
    pub fn ok(command: impl Into<String>) -> Self {
        ToolOutcome {
            success: true,
            command: command.into(),
            report: String::new(),
        }
    }

    pub fn failed(command: impl Into<String>, report: impl Into<String>) -> Self {
        ToolOutcome {
            success: false,
            command: command.into(),
            report: report.into(),
        }
    }

    /// The command line, then whatever the tool printed.
    pub fn diagnostic(&self) -> String {
        if self.report.is_empty() {
            self.command.clone()
        } else {
            format!("{}\n{}", self.command, self.report)
        }
    }
}

/// Compiler family, as reported by `cc --version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolchainPlatform {
    Gcc,
    Clang,
    AppleClang,
}

impl ToolchainPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Clang => "clang",
            ToolchainPlatform::AppleClang => "apple-clang",
        }
    }
}

impl fmt::Display for ToolchainPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implementors spell the commands; the provided methods run them.
///
/// One toolchain serves a whole build and is shared by every worker.
pub trait Toolchain: Send + Sync {
    fn platform(&self) -> ToolchainPlatform;

    /// Decides artifact names (`libfoo.so` or `foo.dll`, `app` or `app.exe`).
    fn os(&self) -> TargetOs {
        TargetOs::host()
    }

    /// C++ dialect passed to C++ compiles, if one was selected.
    fn cxx_standard(&self) -> Option<CppStandard> {
        None
    }

    /// Placed before the target's own compile flags.
    fn default_compile_flags(&self, build_type: BuildType) -> Vec<String>;

    /// Placed before the target's own link flags.
    fn default_link_flags(&self, build_type: BuildType) -> Vec<String>;

    fn compile_command(&self, input: &CompileInput) -> CommandSpec;

    fn depfile_command(&self, input: &DepfileInput) -> CommandSpec;

    fn link_command(&self, input: &LinkInput) -> CommandSpec;

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec;

    fn compile(&self, input: &CompileInput) -> ToolOutcome {
        run_tool(&self.compile_command(input), &input.object)
    }

    fn generate_dependency_file(&self, input: &DepfileInput) -> ToolOutcome {
        run_tool(&self.depfile_command(input), &input.depfile)
    }

    fn link(&self, input: &LinkInput) -> ToolOutcome {
        run_tool(&self.link_command(input), &input.output)
    }

    fn archive(&self, input: &ArchiveInput) -> ToolOutcome {
        // `ar rcs` appends to an existing archive
        let spec = self.archive_command(input);
        if let Err(e) = fs::remove_file_if_exists(&input.output) {
            return ToolOutcome::failed(
                spec.display(),
                format!("failed to remove {}: {}", input.output.display(), e),
            );
        }
        run_tool(&spec, &input.output)
    }
}

/// Run `spec`, which writes `output`. The directory of `output` is created
/// first; a tool that cannot be started is a failed outcome.
pub fn run_tool(spec: &CommandSpec, output: &Path) -> ToolOutcome {
    let command = spec.display();
    if let Err(e) = fs::ensure_parent_dir(output) {
        return ToolOutcome::failed(command, format!("{:#}", e));
    }

    tracing::debug!("{}", command);

    match ProcessBuilder::new(&spec.program).args(&spec.args).exec() {
        Ok(out) => ToolOutcome {
            success: out.status.success(),
            command,
            report: combined_output(&out),
        },
        Err(e) => ToolOutcome::failed(command, format!("{:#}", e)),
    }
}

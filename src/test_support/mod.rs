//! Test utilities for Clinker unit tests.
//!
//! [`RecordingToolchain`] stands in for a real compiler: it spells commands
//! like GCC, records every invocation, and writes the files a compiler
//! would (objects, depfiles, archives, binaries) so that incremental
//! behaviour can be observed across builds.
//!
//! # Example
//!
//! ```rust,ignore
//! use clinker::test_support::{ProjectFixture, RecordingToolchain, Step};
//!
//! let project = ProjectFixture::new()
//!     .manifest("[app]\n")
//!     .file("src/main.cpp", "int main() {}");
//! let toolchain = RecordingToolchain::new();
//! // run a build with &toolchain...
//! assert_eq!(toolchain.count(Step::Compile), 1);
//! ```

pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::builder::toolchain::{
    ArchiveInput, CommandSpec, CompileInput, DepfileInput, GccToolchain, LinkInput, ToolOutcome,
    Toolchain, ToolchainPlatform,
};
use crate::core::build_type::BuildType;
use crate::core::platform::TargetOs;
use crate::util::fs;

pub use fixtures::*;

/// Kind of tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Depfile,
    Compile,
    Archive,
    Link,
}

/// One recorded call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub step: Step,
    /// Source for unit steps, output for archive and link steps
    pub subject: PathBuf,
    pub command: CommandSpec,
}

/// A toolchain that never spawns a process.
pub struct RecordingToolchain {
    commands: GccToolchain,
    headers: HashMap<PathBuf, Vec<PathBuf>>,
    failing: HashSet<PathBuf>,
    failing_links: HashSet<PathBuf>,
    invocations: Mutex<Vec<Invocation>>,
}

impl RecordingToolchain {
    pub fn new() -> Self {
        RecordingToolchain {
            commands: GccToolchain::new(
                PathBuf::from("cc"),
                PathBuf::from("c++"),
                PathBuf::from("ar"),
                ToolchainPlatform::Gcc,
            )
            .with_os(TargetOs::Linux),
            headers: HashMap::new(),
            failing: HashSet::new(),
            failing_links: HashSet::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Headers written into the depfile of `source`.
    pub fn with_headers(mut self, source: impl Into<PathBuf>, headers: &[PathBuf]) -> Self {
        self.headers.insert(source.into(), headers.to_vec());
        self
    }

    /// Make every compile of `source` fail.
    pub fn fail_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.failing.insert(source.into());
        self
    }

    /// Make every link or archive producing `output` fail.
    pub fn fail_link(mut self, output: impl Into<PathBuf>) -> Self {
        self.failing_links.insert(output.into());
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn count(&self, step: Step) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.step == step)
            .count()
    }

    /// Sources compiled, in completion order.
    pub fn compiled_sources(&self) -> Vec<PathBuf> {
        self.subjects(Step::Compile)
    }

    pub fn subjects(&self, step: Step) -> Vec<PathBuf> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.step == step)
            .map(|i| i.subject.clone())
            .collect()
    }

    /// The compile command recorded for `source`.
    pub fn compile_of(&self, source: &Path) -> Option<CommandSpec> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.step == Step::Compile && i.subject == source)
            .map(|i| i.command.clone())
    }

    /// The link or archive command recorded for `output`.
    pub fn link_of(&self, output: &Path) -> Option<CommandSpec> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .find(|i| matches!(i.step, Step::Link | Step::Archive) && i.subject == output)
            .map(|i| i.command.clone())
    }

    /// Index of the first `step` on `subject` among all invocations.
    pub fn position(&self, step: Step, subject: &Path) -> Option<usize> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .position(|i| i.step == step && i.subject == subject)
    }

    pub fn clear(&self) {
        self.invocations.lock().unwrap().clear();
    }

    fn record(&self, step: Step, subject: &Path, command: CommandSpec) {
        self.invocations.lock().unwrap().push(Invocation {
            step,
            subject: subject.to_path_buf(),
            command,
        });
    }

    fn produce(command: &CommandSpec, output: &Path, contents: &str) -> ToolOutcome {
        match fs::write_string(output, contents) {
            Ok(()) => ToolOutcome::ok(command.display()),
            Err(e) => ToolOutcome::failed(command.display(), format!("{:#}", e)),
        }
    }

    fn refused(&self, output: &Path) -> Option<String> {
        self.failing_links
            .contains(output)
            .then(|| format!("ld: cannot open output file {}", output.display()))
    }

    fn missing_objects(objects: &[PathBuf]) -> Option<String> {
        let missing: Vec<String> = objects
            .iter()
            .filter(|o| !o.exists())
            .map(|o| format!("{}: No such file or directory", o.display()))
            .collect();
        if missing.is_empty() {
            None
        } else {
            Some(missing.join("\n"))
        }
    }
}

impl Default for RecordingToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Toolchain for RecordingToolchain {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Gcc
    }

    fn os(&self) -> TargetOs {
        TargetOs::Linux
    }

    fn default_compile_flags(&self, _build_type: BuildType) -> Vec<String> {
        vec!["-Wall".to_string()]
    }

    fn default_link_flags(&self, _build_type: BuildType) -> Vec<String> {
        Vec::new()
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        self.commands.compile_command(input)
    }

    fn depfile_command(&self, input: &DepfileInput) -> CommandSpec {
        self.commands.depfile_command(input)
    }

    fn link_command(&self, input: &LinkInput) -> CommandSpec {
        self.commands.link_command(input)
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        self.commands.archive_command(input)
    }

    fn compile(&self, input: &CompileInput) -> ToolOutcome {
        let command = self.compile_command(input);
        self.record(Step::Compile, &input.source, command.clone());
        if self.failing.contains(&input.source) {
            return ToolOutcome::failed(
                command.display(),
                format!("{}:1:1: error: expected ';'", input.source.display()),
            );
        }
        Self::produce(&command, &input.object, "object")
    }

    fn generate_dependency_file(&self, input: &DepfileInput) -> ToolOutcome {
        let command = self.depfile_command(input);
        self.record(Step::Depfile, &input.source, command.clone());

        let mut listing = format!("{}: {}", input.object.display(), input.source.display());
        for header in self.headers.get(&input.source).into_iter().flatten() {
            listing.push_str(" \\\n  ");
            listing.push_str(&header.display().to_string());
        }
        listing.push('\n');
        Self::produce(&command, &input.depfile, &listing)
    }

    fn link(&self, input: &LinkInput) -> ToolOutcome {
        let command = self.link_command(input);
        self.record(Step::Link, &input.output, command.clone());
        if let Some(report) = self
            .refused(&input.output)
            .or_else(|| Self::missing_objects(&input.objects))
        {
            return ToolOutcome::failed(command.display(), report);
        }
        for lib in &input.libs {
            let found = input.lib_dirs.iter().any(|dir| {
                ["a", "so"]
                    .iter()
                    .any(|ext| dir.join(format!("lib{}.{}", lib, ext)).exists())
            });
            if !found {
                return ToolOutcome::failed(
                    command.display(),
                    format!("ld: cannot find -l{}", lib),
                );
            }
        }
        Self::produce(&command, &input.output, "binary")
    }

    fn archive(&self, input: &ArchiveInput) -> ToolOutcome {
        let command = self.archive_command(input);
        self.record(Step::Archive, &input.output, command.clone());
        if let Some(report) = self
            .refused(&input.output)
            .or_else(|| Self::missing_objects(&input.objects))
        {
            return ToolOutcome::failed(command.display(), report);
        }
        Self::produce(&command, &input.output, "archive")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::Language;
    use tempfile::TempDir;

    #[test]
    fn test_compile_writes_object_and_records() {
        let tmp = TempDir::new().unwrap();
        let toolchain = RecordingToolchain::new();
        let input = CompileInput {
            source: tmp.path().join("a.c"),
            object: tmp.path().join("obj/a.o"),
            include_dirs: vec![],
            flags: vec![],
            language: Language::C,
        };

        assert!(toolchain.compile(&input).success);
        assert!(input.object.exists());
        assert_eq!(toolchain.compiled_sources(), vec![input.source.clone()]);
        assert_eq!(toolchain.compile_of(&input.source).unwrap().argv()[0], "cc");
    }

    #[test]
    fn test_failing_source_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("bad.cpp");
        let toolchain = RecordingToolchain::new().fail_source(&source);
        let input = CompileInput {
            source,
            object: tmp.path().join("bad.o"),
            include_dirs: vec![],
            flags: vec![],
            language: Language::Cxx,
        };

        let outcome = toolchain.compile(&input);
        assert!(!outcome.success);
        assert!(outcome.report.contains("error"));
        assert!(!input.object.exists());
    }

    #[test]
    fn test_depfile_lists_configured_headers() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.cpp");
        let header = tmp.path().join("a.h");
        let toolchain = RecordingToolchain::new().with_headers(&source, &[header.clone()]);
        let input = DepfileInput {
            source: source.clone(),
            depfile: tmp.path().join("a.d"),
            object: tmp.path().join("a.o"),
            include_dirs: vec![],
            flags: vec![],
            language: Language::Cxx,
        };

        assert!(toolchain.generate_dependency_file(&input).success);
        let listed = crate::builder::depfile::read_depfile(&input.depfile).unwrap();
        assert_eq!(listed, vec![source, header]);
    }

    #[test]
    fn test_link_fails_on_missing_object() {
        let tmp = TempDir::new().unwrap();
        let toolchain = RecordingToolchain::new();
        let input = ArchiveInput {
            objects: vec![tmp.path().join("missing.o")],
            output: tmp.path().join("libx.a"),
        };

        let outcome = toolchain.archive(&input);
        assert!(!outcome.success);
        assert!(outcome.report.contains("missing.o"));
        assert_eq!(toolchain.count(Step::Archive), 1);
    }
}

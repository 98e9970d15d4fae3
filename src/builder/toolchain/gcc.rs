//! Command lines for gcc-compatible drivers.

use std::path::{Path, PathBuf};

use crate::core::build_type::BuildType;
use crate::core::platform::TargetOs;
use crate::core::target::{CppStandard, Language};
use crate::util::process::ProcessBuilder;

use super::{
    ArchiveInput, CommandSpec, CompileInput, DepfileInput, LinkInput, Toolchain,
    ToolchainPlatform,
};

const WARNING_FLAGS: &[&str] = &["-Wall", "-Wextra", "-Wpedantic", "-Wshadow"];

const SANITIZER_FLAGS: &[&str] = &["-fsanitize=address", "-fsanitize=undefined"];

const COVERAGE_FLAGS: &[&str] = &["--coverage", "-fno-inline"];

/// Any driver that takes gcc-style flags: gcc, clang and Apple's clang.
#[derive(Debug, Clone)]
pub struct GccToolchain {
    pub cc: PathBuf,
    pub cxx: PathBuf,
    pub ar: PathBuf,
    pub family: ToolchainPlatform,
    pub os: TargetOs,
    /// Probed once at detection; `None` leaves the compiler default.
    pub cxx_std: Option<CppStandard>,
}

impl GccToolchain {
    pub fn new(cc: PathBuf, cxx: PathBuf, ar: PathBuf, family: ToolchainPlatform) -> Self {
        GccToolchain {
            cc,
            cxx,
            ar,
            family,
            os: TargetOs::host(),
            cxx_std: None,
        }
    }

    pub fn with_cxx_standard(mut self, std: Option<CppStandard>) -> Self {
        self.cxx_std = std;
        self
    }

    pub fn with_os(mut self, os: TargetOs) -> Self {
        self.os = os;
        self
    }

    /// The C++ driver that pairs with a C driver: `gcc` gives `g++`,
    /// `clang` gives `clang++` and `cc` gives `c++`. Cross prefixes and
    /// directories are kept.
    pub fn infer_cxx(cc: &Path) -> PathBuf {
        let name = cc.to_string_lossy();
        let whole_cc = name == "cc" || name.ends_with("/cc") || name.ends_with("-cc");

        let cxx = if let Some(prefix) = name.strip_suffix("gcc") {
            format!("{prefix}g++")
        } else if whole_cc {
            format!("{}++", &name[..name.len() - 1])
        } else {
            format!("{name}++")
        };
        PathBuf::from(cxx)
    }

    fn driver(&self, language: Language) -> &Path {
        match language {
            Language::C => &self.cc,
            Language::Cxx => &self.cxx,
        }
    }

    fn dialect_args(&self, language: Language) -> Vec<String> {
        match (language, self.cxx_std) {
            (Language::Cxx, Some(std)) => vec![std.as_flag()],
            _ => Vec::new(),
        }
    }
}

fn include_args(dirs: &[PathBuf]) -> impl Iterator<Item = String> + '_ {
    dirs.iter().map(|d| format!("-I{}", d.display()))
}

fn to_strings(flags: &[&str]) -> Vec<String> {
    flags.iter().map(|f| f.to_string()).collect()
}

impl Toolchain for GccToolchain {
    fn platform(&self) -> ToolchainPlatform {
        self.family
    }

    fn os(&self) -> TargetOs {
        self.os
    }

    fn cxx_standard(&self) -> Option<CppStandard> {
        self.cxx_std
    }

    fn default_compile_flags(&self, build_type: BuildType) -> Vec<String> {
        let mut flags = to_strings(WARNING_FLAGS);
        match build_type {
            BuildType::Default => {}
            BuildType::Release => flags.extend(to_strings(&["-O3", "-DNDEBUG"])),
            BuildType::RelWithDebInfo => flags.extend(to_strings(&["-O3", "-g3", "-DNDEBUG"])),
            BuildType::Debug | BuildType::Coverage => {
                flags.extend(to_strings(&[
                    "-Og",
                    "-g3",
                    "-DDEBUG",
                    "-fno-optimize-sibling-calls",
                    "-fno-omit-frame-pointer",
                ]));
                flags.extend(to_strings(SANITIZER_FLAGS));
                if build_type == BuildType::Coverage {
                    flags.extend(to_strings(COVERAGE_FLAGS));
                }
            }
        }
        flags
    }

    fn default_link_flags(&self, build_type: BuildType) -> Vec<String> {
        match build_type {
            BuildType::Debug => to_strings(SANITIZER_FLAGS),
            BuildType::Coverage => {
                let mut flags = to_strings(SANITIZER_FLAGS);
                flags.extend(to_strings(COVERAGE_FLAGS));
                flags
            }
            _ => Vec::new(),
        }
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        CommandSpec::new(self.driver(input.language))
            .arg("-c")
            .args(self.dialect_args(input.language))
            .args(input.flags.iter().cloned())
            .args(include_args(&input.include_dirs))
            .arg(input.source.display().to_string())
            .arg("-o")
            .arg(input.object.display().to_string())
    }

    fn depfile_command(&self, input: &DepfileInput) -> CommandSpec {
        // -MM leaves system headers out of the listing
        CommandSpec::new(self.driver(input.language))
            .arg("-MM")
            .arg("-MT")
            .arg(input.object.display().to_string())
            .arg("-MF")
            .arg(input.depfile.display().to_string())
            .args(self.dialect_args(input.language))
            .args(input.flags.iter().cloned())
            .args(include_args(&input.include_dirs))
            .arg(input.source.display().to_string())
    }

    fn link_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.driver(input.language));
        if input.shared {
            cmd = cmd.arg("-shared");
        }
        cmd.arg("-o")
            .arg(input.output.display().to_string())
            .args(input.objects.iter().map(|o| o.display().to_string()))
            .args(input.flags.iter().cloned())
            .args(input.lib_dirs.iter().map(|d| format!("-L{}", d.display())))
            .args(input.libs.iter().map(|l| format!("-l{}", l)))
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        CommandSpec::new(&self.ar)
            .arg("rcs")
            .arg(input.output.display().to_string())
            .args(input.objects.iter().map(|o| o.display().to_string()))
    }
}

/// Find the newest C++ dialect `cxx` accepts.
///
/// Each candidate is tried by preprocessing an empty translation unit.
pub fn probe_cxx_standard(cxx: &Path) -> Option<CppStandard> {
    CppStandard::NEWEST_FIRST.into_iter().find(|std| {
        let accepted = ProcessBuilder::new(cxx)
            .args([std.as_flag().as_str(), "-x", "c++", "-E", "-"])
            .stdin(Vec::new())
            .exec()
            .map(|out| out.status.success())
            .unwrap_or(false);
        tracing::debug!("probe {} {}: {}", cxx.display(), std.as_flag(), accepted);
        accepted
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolchain() -> GccToolchain {
        GccToolchain::new(
            PathBuf::from("gcc"),
            PathBuf::from("g++"),
            PathBuf::from("ar"),
            ToolchainPlatform::Gcc,
        )
        .with_os(TargetOs::Linux)
        .with_cxx_standard(Some(CppStandard::Cpp20))
    }

    fn compile_input(language: Language) -> CompileInput {
        CompileInput {
            source: PathBuf::from("src/main.c"),
            object: PathBuf::from("obj/main.o"),
            include_dirs: vec![PathBuf::from("include")],
            flags: vec!["-DUSE_LIB".to_string()],
            language,
        }
    }

    #[test]
    fn test_gcc_compile_command() {
        let cmd = toolchain().compile_command(&compile_input(Language::C));
        assert_eq!(cmd.program, PathBuf::from("gcc"));
        assert_eq!(
            cmd.args,
            vec!["-c", "-DUSE_LIB", "-Iinclude", "src/main.c", "-o", "obj/main.o"]
        );
    }

    #[test]
    fn test_gcc_cxx_compile_command_has_dialect() {
        let cmd = toolchain().compile_command(&compile_input(Language::Cxx));
        assert_eq!(cmd.program, PathBuf::from("g++"));
        assert_eq!(cmd.args[1], "-std=c++20");
    }

    #[test]
    fn test_depfile_command() {
        let input = DepfileInput::for_compile(&compile_input(Language::C), "dep/main.d");
        let cmd = toolchain().depfile_command(&input);
        assert_eq!(
            &cmd.args[..5],
            &["-MM", "-MT", "obj/main.o", "-MF", "dep/main.d"]
        );
        assert_eq!(cmd.args.last().map(String::as_str), Some("src/main.c"));
    }

    #[test]
    fn test_link_command() {
        let input = LinkInput {
            objects: vec![PathBuf::from("obj/main.o")],
            output: PathBuf::from("bin/app"),
            flags: vec!["-pthread".to_string()],
            lib_dirs: vec![PathBuf::from("build/lib/lib")],
            libs: vec!["lib".to_string()],
            shared: true,
            language: Language::Cxx,
        };
        let cmd = toolchain().link_command(&input);
        assert_eq!(
            cmd.args,
            vec![
                "-shared",
                "-o",
                "bin/app",
                "obj/main.o",
                "-pthread",
                "-Lbuild/lib/lib",
                "-llib"
            ]
        );
    }

    #[test]
    fn test_archive_command() {
        let input = ArchiveInput {
            objects: vec![PathBuf::from("a.o"), PathBuf::from("b.o")],
            output: PathBuf::from("libfoo.a"),
        };
        let cmd = toolchain().archive_command(&input);
        assert_eq!(cmd.program, PathBuf::from("ar"));
        assert_eq!(cmd.args, vec!["rcs", "libfoo.a", "a.o", "b.o"]);
    }

    #[test]
    fn test_default_flags_per_build_type() {
        let tc = toolchain();
        assert_eq!(
            tc.default_compile_flags(BuildType::Default),
            vec!["-Wall", "-Wextra", "-Wpedantic", "-Wshadow"]
        );
        assert!(tc
            .default_compile_flags(BuildType::Release)
            .ends_with(&["-O3".to_string(), "-DNDEBUG".to_string()]));
        let coverage = tc.default_compile_flags(BuildType::Coverage);
        assert!(coverage.contains(&"-DDEBUG".to_string()));
        assert!(coverage.contains(&"--coverage".to_string()));
        assert!(tc.default_link_flags(BuildType::Release).is_empty());
        assert_eq!(
            tc.default_link_flags(BuildType::Debug),
            vec!["-fsanitize=address", "-fsanitize=undefined"]
        );
    }

    #[test]
    fn test_infer_cxx() {
        assert_eq!(GccToolchain::infer_cxx(Path::new("gcc")), PathBuf::from("g++"));
        assert_eq!(
            GccToolchain::infer_cxx(Path::new("x86_64-linux-gnu-gcc")),
            PathBuf::from("x86_64-linux-gnu-g++")
        );
        assert_eq!(GccToolchain::infer_cxx(Path::new("clang")), PathBuf::from("clang++"));
        assert_eq!(GccToolchain::infer_cxx(Path::new("/usr/bin/cc")), PathBuf::from("/usr/bin/c++"));
    }
}

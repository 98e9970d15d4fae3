//! Running compilers, archivers and probes.
//!
//! Children never inherit the terminal: stdin is closed unless data is
//! given, and both output streams are captured for the build report.

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

/// One external command, built up and then run to completion.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<OsString>,
    input: Option<Vec<u8>>,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            input: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Bytes written to the child's stdin before it is closed.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.input = Some(data.into());
        self
    }

    /// Run and wait. Only failing to start or talk to the child is an
    /// error; a non-zero exit is reported through the returned status.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let program = self.program.display();
        let Some(input) = &self.input else {
            return cmd
                .stdin(Stdio::null())
                .output()
                .with_context(|| format!("failed to run `{}`", program));
        };

        let mut child = cmd
            .stdin(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run `{}`", program))?;
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input)
                .with_context(|| format!("failed to feed stdin of `{}`", program))?;
        }
        child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", program))
    }
}

/// Stdout then stderr of a finished process, trailing whitespace removed.
pub fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let parts: Vec<&str> = [stdout.trim_end(), stderr.trim_end()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    parts.join("\n")
}

/// Resolve a tool name (or path) through PATH.
pub fn find_executable(name: impl AsRef<OsStr>) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_output_is_captured() {
        let output = ProcessBuilder::new("sh")
            .args(["-c", "echo out; echo err >&2; exit 3"])
            .exec()
            .unwrap();

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(combined_output(&output), "out\nerr");
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_is_forwarded() {
        let output = ProcessBuilder::new("sh")
            .args(["-c", "cat; printf ' done'"])
            .stdin("piped")
            .exec()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "piped done");
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let err = ProcessBuilder::new("clinker-definitely-not-a-program")
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains("clinker-definitely-not-a-program"));
    }
}

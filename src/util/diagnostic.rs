//! User-facing diagnostic messages.
//!
//! Configuration problems are reported as one diagnostic with a note per
//! violation, so a single run shows everything that is wrong.

use std::fmt;
use std::fmt::Write as _;

/// Hints attached to the errors users hit most often.
pub mod suggestions {
    pub const NO_MANIFEST: &str = "help: Create a `clinker.toml` with one table per target";

    pub const TARGET_NOT_FOUND: &str = "Run `clinker graph` to list the targets of this project";

    pub const BUILD_FAILED: &str = "Run `clinker build --verbose` to see every command";

    pub const NO_COMPILER: &str =
        "Install gcc or clang, or point CC/CXX/AR (or [toolchain] in .clinker/config.toml) at one";
}

const RED: &str = "\x1b[1;31m";
const GREEN: &str = "\x1b[1;32m";
const RESET: &str = "\x1b[0m";

/// An error headline, the notes explaining it, and hints for fixing it.
#[derive(Debug, Clone, Default)]
pub struct Diagnostic {
    pub headline: String,
    /// One entry per problem; compiler output may span several lines.
    pub notes: Vec<String>,
    pub help: Vec<String>,
}

impl Diagnostic {
    pub fn error(headline: impl Into<String>) -> Self {
        Diagnostic {
            headline: headline.into(),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    /// Render for a terminal, with ANSI colors when `color` is set.
    pub fn render(&self, color: bool) -> String {
        let paint = |label: &str, code: &str| {
            if color {
                format!("{code}{label}{RESET}")
            } else {
                label.to_string()
            }
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}: {}", paint("error", RED), self.headline);

        for note in &self.notes {
            for (i, line) in note.lines().enumerate() {
                let lead = if i == 0 { "  - " } else { "    " };
                let _ = writeln!(out, "{lead}{line}");
            }
        }

        if !self.help.is_empty() {
            let _ = writeln!(out, "\n{}: consider:", paint("help", GREEN));
            for (i, hint) in self.help.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, hint);
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.render(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_and_help_are_listed() {
        let diag = Diagnostic::error("invalid build configuration")
            .with_note("dependency cycle: a -> b -> a")
            .with_note("target `app` depends on unknown target `zlib`")
            .with_help("Remove one edge of the cycle");

        let output = diag.render(false);
        assert!(output.starts_with("error: invalid build configuration\n"));
        assert!(output.contains("  - dependency cycle: a -> b -> a\n"));
        assert!(output.contains("  - target `app` depends on unknown target `zlib`\n"));
        assert!(output.contains("help: consider:\n  1. Remove one edge of the cycle\n"));
    }

    #[test]
    fn test_compiler_output_keeps_its_lines() {
        let diag = Diagnostic::error("compile failed").with_note("main.c\nline 1\nline 2");
        assert!(diag
            .to_string()
            .contains("  - main.c\n    line 1\n    line 2\n"));
        assert!(!diag.to_string().contains("help"));
    }

    #[test]
    fn test_color_codes_only_when_asked() {
        let diag = Diagnostic::error("boom").with_help("retry");
        assert!(!diag.render(false).contains('\x1b'));
        assert!(diag.render(true).contains(RED));
    }
}

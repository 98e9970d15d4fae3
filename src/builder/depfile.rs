//! Make-style dependency listing (`.d` file) parsing.
//!
//! ```text
//! obj/main.o: src/main.cpp include/a.h \
//!   include/with\ space.h
//! ```
//!
//! Everything up to the first `:` followed by whitespace is the rule target
//! and is dropped. The remaining text is split on whitespace, where a
//! backslash-newline is a continuation and `\ ` is a space inside a path.

use std::io;
use std::path::{Path, PathBuf};

/// Paths listed as prerequisites in a dependency file.
pub fn parse_depfile(content: &str) -> Vec<PathBuf> {
    let body = match find_rule_separator(content) {
        Some(pos) => &content[pos + 1..],
        None => return Vec::new(),
    };

    let mut paths = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(' ') => {
                    current.push(' ');
                    chars.next();
                }
                Some('\n') | Some('\r') => {
                    chars.next();
                    flush(&mut current, &mut paths);
                }
                _ => current.push('\\'),
            },
            c if c.is_whitespace() => flush(&mut current, &mut paths),
            c => current.push(c),
        }
    }
    flush(&mut current, &mut paths);

    paths
}

/// Read and parse the dependency file at `path`.
pub fn read_depfile(path: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(parse_depfile(&std::fs::read_to_string(path)?))
}

/// Position of the colon that ends the rule target.
///
/// A colon directly followed by a path character (as in `C:\`) does not
/// end the target.
fn find_rule_separator(content: &str) -> Option<usize> {
    let bytes = content.as_bytes();
    bytes.iter().enumerate().find_map(|(i, &b)| {
        let ends_target = b == b':'
            && bytes
                .get(i + 1)
                .map_or(true, |next| next.is_ascii_whitespace());
        ends_target.then_some(i)
    })
}

fn flush(current: &mut String, paths: &mut Vec<PathBuf>) {
    if current.is_empty() {
        return;
    }
    // Phony targets from -MP look like `header.h:`
    if !current.ends_with(':') {
        paths.push(PathBuf::from(current.as_str()));
    }
    current.clear();
}

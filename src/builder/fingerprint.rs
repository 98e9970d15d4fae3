//! Staleness checks for incremental builds.
//!
//! A unit is fresh only when its object exists, is newer than its source,
//! and is newer than every file listed in the depfile written by the
//! previous build. Modification times are compared strictly: equal times
//! count as fresh.
//!
//! Artifacts follow the same rule against their objects and the library
//! artifacts they link, and additionally remember the command that
//! produced them in a `.link` stamp next to the depfiles.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::builder::depfile::read_depfile;
use crate::builder::unit::TranslationUnit;
use crate::util::fs::{self, mtime};

/// Why a unit needs compiling, or that it does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Forced,
    MissingObject,
    SourceNewer,
    MissingDepfile,
    /// A listed dependency is missing or newer than the object
    DependencyChanged(PathBuf),
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        !matches!(self, Staleness::Fresh)
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::Fresh => write!(f, "fresh"),
            Staleness::Forced => write!(f, "forced"),
            Staleness::MissingObject => write!(f, "object missing"),
            Staleness::SourceNewer => write!(f, "source changed"),
            Staleness::MissingDepfile => write!(f, "dependency file missing"),
            Staleness::DependencyChanged(path) => write!(f, "{} changed", path.display()),
        }
    }
}

/// Decide whether `unit` must be recompiled.
pub fn check_unit(unit: &TranslationUnit, force: bool) -> Staleness {
    if force {
        return Staleness::Forced;
    }

    let Some(object_time) = mtime(&unit.object) else {
        return Staleness::MissingObject;
    };

    match mtime(&unit.source) {
        Some(source_time) if source_time <= object_time => {}
        _ => return Staleness::SourceNewer,
    }

    let Ok(listed) = read_depfile(&unit.depfile) else {
        return Staleness::MissingDepfile;
    };

    for path in listed {
        match mtime(&path) {
            Some(time) if time <= object_time => {}
            _ => return Staleness::DependencyChanged(path),
        }
    }

    Staleness::Fresh
}

/// Why an archive or link step must run, or that it need not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStaleness {
    Fresh,
    Forced,
    MissingOutput,
    /// An object or library artifact is missing or newer than the output
    InputChanged(PathBuf),
    /// The stamp is missing or holds a different command
    CommandChanged,
}

impl LinkStaleness {
    pub fn is_stale(&self) -> bool {
        !matches!(self, LinkStaleness::Fresh)
    }
}

impl fmt::Display for LinkStaleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStaleness::Fresh => write!(f, "fresh"),
            LinkStaleness::Forced => write!(f, "forced"),
            LinkStaleness::MissingOutput => write!(f, "artifact missing"),
            LinkStaleness::InputChanged(path) => write!(f, "{} changed", path.display()),
            LinkStaleness::CommandChanged => write!(f, "command changed"),
        }
    }
}

/// What an artifact was last produced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub output: PathBuf,
    /// Objects, then the artifacts of linked libraries
    pub inputs: Vec<PathBuf>,
    pub command: String,
    pub stamp: PathBuf,
}

impl LinkRecord {
    /// Decide whether the artifact must be produced again.
    pub fn check(&self, force: bool) -> LinkStaleness {
        if force {
            return LinkStaleness::Forced;
        }

        let Some(output_time) = mtime(&self.output) else {
            return LinkStaleness::MissingOutput;
        };

        for input in &self.inputs {
            match mtime(input) {
                Some(time) if time <= output_time => {}
                _ => return LinkStaleness::InputChanged(input.clone()),
            }
        }

        match std::fs::read_to_string(&self.stamp) {
            Ok(previous) if previous == self.command => LinkStaleness::Fresh,
            _ => LinkStaleness::CommandChanged,
        }
    }

    /// Remember the command after a successful step.
    pub fn save(&self) -> anyhow::Result<()> {
        fs::write_string(&self.stamp, &self.command)
    }

    /// Forget a failed step: neither the old artifact nor its stamp may
    /// pass for fresh afterwards.
    pub fn discard(&self) -> io::Result<()> {
        fs::remove_file_if_exists(&self.output)?;
        fs::remove_file_if_exists(&self.stamp)
    }
}

//! Progress events, emitted on the coordinating thread.
//!
//! With `--message-format json` each event is printed as one JSON object
//! per line, tagged by `reason`; otherwise they drive the progress bar.
//! Consumers match on `reason`, so variant names are part of the output
//! format.

use std::path::PathBuf;

use serde::Serialize;

use crate::builder::scheduler::TargetState;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum BuildEvent {
    /// Planning is done and the first jobs are about to start.
    BuildStarted {
        build_type: String,
        targets: u64,
        /// Stale units only; fresh ones are never scheduled.
        units: u64,
    },

    UnitCompiled {
        target: String,
        source: PathBuf,
        object: PathBuf,
        success: bool,
    },

    TargetState { target: String, state: TargetState },

    /// A failed compile, dependency scan or link, with the tool's output.
    CompilerError {
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        message: String,
    },

    /// Every target in the build set reached a final state.
    BuildFinished {
        success: bool,
        duration_ms: u64,
        compiled_units: u64,
        linked_targets: u64,
    },
}

impl BuildEvent {
    pub fn started(build_type: impl Into<String>, targets: usize, units: usize) -> Self {
        BuildEvent::BuildStarted {
            build_type: build_type.into(),
            targets: targets as u64,
            units: units as u64,
        }
    }

    pub fn state(target: impl Into<String>, state: TargetState) -> Self {
        BuildEvent::TargetState {
            target: target.into(),
            state,
        }
    }

    pub fn error(target: impl Into<String>, file: Option<PathBuf>, message: impl Into<String>) -> Self {
        BuildEvent::CompilerError {
            target: target.into(),
            file,
            message: message.into(),
        }
    }

    /// One line of `--message-format json` output.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!("unserializable event {:?}: {}", self, e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_serialization() {
        let json = BuildEvent::started("release", 3, 12).to_json();
        assert!(json.contains("\"reason\":\"build-started\""));
        assert!(json.contains("\"build_type\":\"release\""));
        assert!(json.contains("\"units\":12"));
    }

    #[test]
    fn test_state_serialization() {
        let json = BuildEvent::state("app", TargetState::CompiledWithFailures).to_json();
        assert_eq!(
            json,
            r#"{"reason":"target-state","target":"app","state":"compiled-with-failures"}"#
        );
    }

    #[test]
    fn test_error_without_file() {
        let json = BuildEvent::error("app", None, "undefined reference to `foo`").to_json();
        assert!(json.contains("\"reason\":\"compiler-error\""));
        assert!(!json.contains("\"file\""));
    }

    #[test]
    fn test_unit_and_finish_reasons() {
        let unit = BuildEvent::UnitCompiled {
            target: "net".into(),
            source: PathBuf::from("src/socket.c"),
            object: PathBuf::from("obj/socket.o"),
            success: false,
        };
        assert!(unit.to_json().starts_with(r#"{"reason":"unit-compiled","target":"net""#));

        let done = BuildEvent::BuildFinished {
            success: false,
            duration_ms: 15,
            compiled_units: 3,
            linked_targets: 0,
        }
        .to_json();
        assert!(done.contains("\"reason\":\"build-finished\""));
        assert!(done.contains("\"linked_targets\":0"));
    }
}

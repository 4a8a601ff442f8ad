//! The wire-stable status vocabulary every tool-facing response carries.
//!
//! Kept as a flat `serde`-tagged enum the way the teacher tags its
//! API/daemon responses (`serde(rename_all = "snake_case")`), so external
//! callers get a stable lowercase string regardless of how the classifier
//! internals evolve.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// A command is executing; no prompt is currently visible.
    Running,
    /// A shell prompt is visible and the session is ready for input.
    Ready,
    /// A REPL prompt (Python, Node, etc.) is visible.
    Repl,
    /// The screen looks like it's waiting for a password (echo likely off).
    Password,
    /// The screen looks like it's waiting for a yes/no confirmation.
    Confirm,
    /// A full-screen editor (vim, nano, emacs) appears to be active.
    Editor,
    /// A pager (less, more, man) appears to be active.
    Pager,
    /// The screen shows signs of an error (traceback, "command not found").
    Error,
    /// The child process has exited; no further input is accepted.
    Eof,
    /// None of the above rules matched.
    Unknown,
    /// The session was explicitly terminated.
    Terminated,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Eof | Status::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&Status::Ready).unwrap();
        assert_eq!(json, "\"ready\"");
        let json = serde_json::to_string(&Status::Eof).unwrap();
        assert_eq!(json, "\"eof\"");
    }

    #[test]
    fn terminal_statuses() {
        assert!(Status::Eof.is_terminal());
        assert!(Status::Terminated.is_terminal());
        assert!(!Status::Ready.is_terminal());
    }
}

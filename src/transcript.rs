//! Transcript store: an append-only raw byte log plus a structured
//! interaction log and a `session.json` metadata file, one directory per
//! session under a configurable root.
//!
//! Grounded in the teacher's `daemon::get_daemon_dir()`/`get_daemon_log_file()`
//! path-helper pattern (`dirs::home_dir()` plus a dotted directory), and its
//! `daemon::config::DaemonConfig::{load,save}` use of `serde`-backed files
//! for the metadata snapshot.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::status::Status;

/// Direction of an interaction-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
}

/// One line of the structured interaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub payload: String,
}

/// `session.json`: point-in-time metadata, rewritten on significant events
/// (spawn, status change, terminate) rather than on every byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub id: String,
    pub tag: Option<String>,
    pub cwd: Option<PathBuf>,
    pub cols: u16,
    pub rows: u16,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub terminated: bool,
    pub last_status: Status,
}

/// On-disk state for one session: `transcript.log` (raw bytes),
/// `interaction.log` (newline-delimited JSON), `session.json` (metadata).
pub struct Transcript {
    dir: PathBuf,
    raw_log: File,
    interaction_log: File,
}

const REDACTED_MARKER: &str = "<redacted>";

/// Point `root/active/<session_id>` at `target` (the session's directory
/// under `sessions/`), replacing any stale symlink left by a prior process.
#[cfg(unix)]
fn link_active(root: &std::path::Path, session_id: &str, target: &std::path::Path) -> Result<()> {
    let active_dir = root.join("active");
    std::fs::create_dir_all(&active_dir)?;
    let link = active_dir.join(session_id);
    match std::fs::symlink_metadata(&link) {
        Ok(_) => std::fs::remove_file(&link)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::os::unix::fs::symlink(target, &link)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_active(_root: &std::path::Path, _session_id: &str, _target: &std::path::Path) -> Result<()> {
    Ok(())
}

impl Transcript {
    /// Create (or reopen) the on-disk directory for `session_id` under
    /// `root`, and point `root/active/<session_id>` at it while it's live.
    pub fn open(root: &std::path::Path, session_id: &str) -> Result<Self> {
        let dir = root.join("sessions").join(session_id);
        std::fs::create_dir_all(&dir)?;

        let raw_log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("transcript.log"))?;
        let interaction_log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("interaction.log"))?;

        link_active(root, session_id, &dir)?;

        Ok(Transcript { dir, raw_log, interaction_log })
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Remove the `active/<id>` symlink once the session is no longer live
    /// (called from `terminate()`, which also covers eviction since eviction
    /// terminates first). `transcript.log`/`interaction.log`/`session.json`
    /// stay put under `sessions/<id>` regardless.
    pub fn retire(&self) {
        if let (Some(sessions_dir), Some(id)) = (self.dir.parent(), self.dir.file_name()) {
            if let Some(root) = sessions_dir.parent() {
                let _ = std::fs::remove_file(root.join("active").join(id));
            }
        }
    }

    /// Append a chunk of raw PTY output. Called by the ingestion loop for
    /// every chunk it reads, before feeding the emulator.
    pub fn append_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.raw_log.write_all(bytes)?;
        Ok(())
    }

    /// Append one structured interaction-log line. Password payloads are
    /// redacted by the caller before this is invoked — the transcript store
    /// itself has no notion of which sends are secrets.
    pub fn append_interaction(&mut self, direction: Direction, payload: &str) -> Result<()> {
        let entry = InteractionEntry {
            timestamp: Utc::now(),
            direction,
            payload: payload.to_string(),
        };
        let line = serde_json::to_string(&entry).map_err(|e| {
            crate::error::Error::IoError(std::io::Error::other(e.to_string()))
        })?;
        writeln!(self.interaction_log, "{line}")?;
        Ok(())
    }

    /// Convenience for password sends: logs the redaction marker instead of
    /// the real payload.
    pub fn append_redacted_input(&mut self) -> Result<()> {
        self.append_interaction(Direction::Input, REDACTED_MARKER)
    }

    pub fn write_metadata(&self, metadata: &SessionMetadata) -> Result<()> {
        let json = serde_json::to_string_pretty(metadata).map_err(|e| {
            crate::error::Error::IoError(std::io::Error::other(e.to_string()))
        })?;
        std::fs::write(self.dir.join("session.json"), json)?;
        Ok(())
    }

    pub fn read_metadata(dir: &std::path::Path) -> Result<SessionMetadata> {
        let raw = std::fs::read_to_string(dir.join("session.json"))?;
        serde_json::from_str(&raw).map_err(|e| crate::error::Error::IoError(std::io::Error::other(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn metadata(id: &str) -> SessionMetadata {
        SessionMetadata {
            id: id.to_string(),
            tag: None,
            cwd: None,
            cols: 80,
            rows: 24,
            created_at: Utc::now(),
            last_activity_at: Utc::now(),
            terminated: false,
            last_status: Status::Ready,
        }
    }

    #[test]
    fn append_and_read_raw_log() {
        let root = TempDir::new().unwrap();
        let mut t = Transcript::open(root.path(), "sess-1").unwrap();
        t.append_raw(b"hello world").unwrap();
        let raw = std::fs::read(t.dir().join("transcript.log")).unwrap();
        assert_eq!(raw, b"hello world");
    }

    #[test]
    fn password_sends_are_redacted() {
        let root = TempDir::new().unwrap();
        let mut t = Transcript::open(root.path(), "sess-2").unwrap();
        t.append_redacted_input().unwrap();
        let contents = std::fs::read_to_string(t.dir().join("interaction.log")).unwrap();
        assert!(contents.contains(REDACTED_MARKER));
        assert!(!contents.contains("hunter2"));
    }

    #[test]
    #[cfg(unix)]
    fn open_creates_active_symlink_and_retire_removes_it() {
        let root = TempDir::new().unwrap();
        let t = Transcript::open(root.path(), "sess-active").unwrap();

        let link = root.path().join("active").join("sess-active");
        let target = std::fs::read_link(&link).unwrap();
        assert_eq!(target, t.dir());

        t.retire();
        assert!(std::fs::symlink_metadata(&link).is_err());
        // the transcript directory itself is untouched by retire().
        assert!(t.dir().exists());
    }

    #[test]
    fn metadata_round_trips() {
        let root = TempDir::new().unwrap();
        let t = Transcript::open(root.path(), "sess-3").unwrap();
        let meta = metadata("sess-3");
        t.write_metadata(&meta).unwrap();
        let read_back = Transcript::read_metadata(t.dir()).unwrap();
        assert_eq!(read_back.id, "sess-3");
        assert_eq!(read_back.cols, 80);
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let root = TempDir::new().unwrap();
        {
            let mut t = Transcript::open(root.path(), "sess-4").unwrap();
            t.append_raw(b"first").unwrap();
        }
        {
            let mut t = Transcript::open(root.path(), "sess-4").unwrap();
            t.append_raw(b"second").unwrap();
        }
        let raw = std::fs::read(root.path().join("sessions/sess-4/transcript.log")).unwrap();
        assert_eq!(raw, b"firstsecond");
    }
}

//! Registry: process-wide id → Session map, with create-on-first-input,
//! lookup, list, terminate, and eviction.
//!
//! Backed by `dashmap::DashMap`, matching the teacher's existing dependency
//! on `dashmap` for concurrent maps elsewhere in `cco`'s daemon layer.
//! Terminated sessions remain as tombstones (spec.md section 4.8) so a
//! lookup after termination still resolves to something carrying
//! `status=terminated` and the on-disk transcript path, rather than
//! `NoSuchSession`.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{Session, SessionOptions};
use crate::status::Status;

/// What a lookup returns for an id that existed but is no longer live.
#[derive(Debug, Clone)]
pub struct Tombstone {
    pub transcript_dir: PathBuf,
}

enum Entry {
    Live(Arc<Session>),
    Evicted(Tombstone),
}

/// Process-wide session registry.
pub struct Registry {
    sessions: DashMap<String, Entry>,
    config: Config,
}

impl Registry {
    pub fn new(config: Config) -> Self {
        Registry {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Create a new session under `options.id`. Errors if the id is
    /// already in use (live or tombstoned) — ids are one-shot, matching
    /// the spec's "id remains reserved after termination" invariant.
    pub fn create(&self, options: SessionOptions) -> Result<Arc<Session>> {
        if self.sessions.contains_key(&options.id) {
            return Err(Error::InvalidArgument(format!(
                "session id already in use: {}",
                options.id
            )));
        }
        let id = options.id.clone();
        let session = Session::spawn(options, &self.config)?;
        self.sessions.insert(id.clone(), Entry::Live(session.clone()));
        info!(session_id = %id, "session registered");
        Ok(session)
    }

    /// Look up a session by id. Returns `Ok(None)` only if the id was
    /// never created; a tombstoned id resolves to `Err(Error::Terminated)`
    /// carrying the transcript path in the message so callers can still
    /// point a human at the history.
    pub fn get(&self, id: &str) -> Result<Arc<Session>> {
        match self.sessions.get(id).map(|e| match e.value() {
            Entry::Live(session) => Some(session.clone()),
            Entry::Evicted(_) => None,
        }) {
            Some(Some(session)) => Ok(session),
            Some(None) => {
                let dir = self.tombstone_dir(id);
                Err(Error::Terminated(format!(
                    "session {id} was terminated and evicted; transcript at {}",
                    dir.display()
                )))
            }
            None => Err(Error::NoSuchSession(id.to_string())),
        }
    }

    fn tombstone_dir(&self, id: &str) -> PathBuf {
        if let Some(entry) = self.sessions.get(id) {
            if let Entry::Evicted(tombstone) = entry.value() {
                return tombstone.transcript_dir.clone();
            }
        }
        self.config.root.join("sessions").join(id)
    }

    /// List every known id along with its current status — tombstoned ids
    /// report `Terminated` since eviction only ever follows termination.
    pub fn list(&self) -> Vec<(String, Status)> {
        self.sessions
            .iter()
            .map(|e| {
                let status = match e.value() {
                    Entry::Live(session) => session.get_metadata().last_status,
                    Entry::Evicted(_) => Status::Terminated,
                };
                (e.key().clone(), status)
            })
            .collect()
    }

    pub fn terminate(&self, id: &str) -> Result<()> {
        let session = self.get(id)?;
        session.terminate()?;
        Ok(())
    }

    /// Free the in-memory `Session` (closing its ingestion thread and PTY
    /// if not already terminated) while leaving the on-disk transcript
    /// queryable. Supplements spec.md section 3's "may be evicted"
    /// invariant with the concrete operation the registry needs to bound
    /// memory use across long-running processes with many old sessions.
    pub fn evict(&self, id: &str) -> Result<()> {
        let Some(mut entry) = self.sessions.get_mut(id) else {
            return Err(Error::NoSuchSession(id.to_string()));
        };
        if let Entry::Live(session) = entry.value() {
            let transcript_dir = session.transcript_dir();
            let _ = session.terminate();
            *entry.value_mut() = Entry::Evicted(Tombstone { transcript_dir });
            info!(session_id = %id, "session evicted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (Registry, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.root = dir.path().to_path_buf();
        (Registry::new(config), dir)
    }

    #[test]
    fn create_and_lookup() {
        let (registry, _dir) = registry();
        let mut options = SessionOptions::new("s1");
        options.cmd = Some("/bin/sh".into());
        registry.create(options).unwrap();
        assert!(registry.get("s1").is_ok());
        assert_eq!(registry.list(), vec![("s1".to_string(), Status::Ready)]);
    }

    #[test]
    fn duplicate_id_rejected() {
        let (registry, _dir) = registry();
        let mut options = SessionOptions::new("dup");
        options.cmd = Some("/bin/sh".into());
        registry.create(options).unwrap();
        let mut again = SessionOptions::new("dup");
        again.cmd = Some("/bin/sh".into());
        assert!(registry.create(again).is_err());
    }

    #[test]
    fn unknown_id_is_no_such_session() {
        let (registry, _dir) = registry();
        match registry.get("missing") {
            Err(Error::NoSuchSession(_)) => {}
            other => panic!("expected NoSuchSession, got {other:?}"),
        }
    }

    #[test]
    fn evicted_session_becomes_tombstone() {
        let (registry, _dir) = registry();
        let mut options = SessionOptions::new("s2");
        options.cmd = Some("/bin/sh".into());
        registry.create(options).unwrap();
        registry.evict("s2").unwrap();
        match registry.get("s2") {
            Err(Error::Terminated(_)) => {}
            other => panic!("expected Terminated tombstone, got {other:?}"),
        }
    }
}

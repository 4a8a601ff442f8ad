//! Agent-facing server core for long-lived, stateful PTY sessions.
//!
//! Mirrors the teacher's curated `lib.rs` re-export surface (`cco`'s
//! `pub mod` + `pub use` list) with the module set this crate actually
//! needs: a PTY channel, a VT100 emulator, the ingestion/quiescence
//! pipeline sitting between them, a state classifier, and the session
//! registry that ties it all together for callers.

pub mod classifier;
pub mod config;
pub mod emulator;
pub mod error;
pub mod ingestion;
pub mod prompt;
pub mod pty;
pub mod quiescence;
pub mod registry;
pub mod ring;
pub mod session;
pub mod status;
pub mod transcript;

pub use classifier::StatusSampler;
pub use config::Config;
pub use error::{Error, Result};
pub use registry::Registry;
pub use session::{Session, SessionOptions};
pub use status::Status;

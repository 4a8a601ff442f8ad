//! Error taxonomy for the PTY session core.
//!
//! Mirrors the teacher's per-subsystem `thiserror` enums (e.g.
//! `auth::device_flow::DeviceFlowError`): a dedicated enum for call sites
//! that need to pattern-match on a specific failure, with `anyhow::Result`
//! used everywhere else.

use thiserror::Error;

/// Errors surfaced by the PTY session core.
///
/// `Timeout` is intentionally absent: quiescence and `expect` deadlines are
/// not errors. The caller gets back a normal response with whatever output
/// accumulated and the classifier's best guess at `status`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no such session: {0}")]
    NoSuchSession(String),

    #[error("session is terminated: {0}")]
    Terminated(String),

    #[error("failed to spawn child process: {0}")]
    SpawnError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

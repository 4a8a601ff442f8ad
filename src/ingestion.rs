//! Ingestion loop: one dedicated OS thread per session, draining the PTY
//! and feeding the transcript, emulator, and ring in the order spec.md
//! section 4.3 requires.
//!
//! Grounded in the teacher's `terminal::TerminalSession` design, which
//! likewise gives every session its own async task reading the PTY; this
//! uses a plain `std::thread` instead of a tokio task because reads are
//! non-blocking polls against a raw fd rather than an async-aware handle
//! (matching the other_examples `PtyHandle::read_async`, which also falls
//! back to `spawn_blocking` for the same reason).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::session::SessionInner;
use crate::status::Status;
use crate::transcript::Direction;

const POLL_INTERVAL: Duration = Duration::from_millis(15);

/// Handle to a running ingestion thread. Dropping this does not stop the
/// thread — the thread stops on its own once the PTY reports EOF or the
/// session is terminated; `join` is provided for tests and clean shutdown.
pub struct IngestionHandle {
    join: Option<std::thread::JoinHandle<()>>,
}

impl IngestionHandle {
    pub fn join(mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

pub fn spawn(session: Arc<SessionInner>) -> IngestionHandle {
    let join = std::thread::Builder::new()
        .name(format!("piloty-ingest-{}", session.id))
        .spawn(move || run(session))
        .expect("failed to spawn ingestion thread");
    IngestionHandle { join: Some(join) }
}

fn run(session: Arc<SessionInner>) {
    debug!(session_id = %session.id, "ingestion loop starting");
    let mut buf = [0u8; 8192];

    loop {
        if session.terminated.load(Ordering::SeqCst) {
            break;
        }

        let read = {
            let mut pty = session.pty.lock();
            pty.read_nonblocking(&mut buf)
        };

        match read {
            Ok(0) => {
                let still_running = {
                    let mut pty = session.pty.lock();
                    pty.is_running()
                };
                if !still_running {
                    handle_eof(&session);
                    break;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Ok(n) => {
                let chunk = &buf[..n];
                trace!(session_id = %session.id, bytes = n, "ingested chunk");

                if let Err(e) = session.transcript.lock().append_raw(chunk) {
                    warn!(session_id = %session.id, error = %e, "failed to append transcript");
                }
                session.emulator.lock().feed(chunk);
                session.ring.lock().push(chunk);
                *session.last_activity.lock() = Instant::now();
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "ingestion read error, stopping loop");
                handle_eof(&session);
                break;
            }
        }
    }
    debug!(session_id = %session.id, "ingestion loop stopped");
}

fn handle_eof(session: &Arc<SessionInner>) {
    session.eof.store(true, Ordering::SeqCst);
    let _ = session
        .transcript
        .lock()
        .append_interaction(Direction::Output, "<eof>");
    *session.cached_status.lock() = Status::Eof;
}

//! Quiescence collector: turns the ingestion ring's continuous byte stream
//! into request-sized response chunks, per spec.md section 4.4.
//!
//! No direct teacher equivalent (`cco` has no quiescence concept — its
//! terminal reads are fire-and-forget); this is new code grounded in the
//! ring/cursor primitives in `ring.rs` and the polling style already used
//! in `pty::PtyChannel::read_until_quiescent`.

use std::time::{Duration, Instant};

use regex::Regex;

use crate::session::SessionInner;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Read from the session's ring until either `quiescence` has passed with
/// no new bytes, or `max_wait` elapses, whichever comes first. Returns
/// whatever accumulated; an empty result with `max_wait` elapsed is the
/// collector's definition of "nothing happened" — callers surface this as
/// a timeout, never as an error.
pub fn collect_quiescent(session: &SessionInner, quiescence: Duration, max_wait: Duration) -> Vec<u8> {
    let deadline = Instant::now() + max_wait;
    let mut collected = Vec::new();
    let mut last_activity = Instant::now();

    loop {
        let chunk = {
            let ring = session.ring.lock();
            let mut cursor = session.ring_cursor.lock();
            ring.read_since(&mut cursor)
        };
        if !chunk.is_empty() {
            collected.extend_from_slice(&chunk);
            last_activity = Instant::now();
        }
        if Instant::now() >= deadline {
            return collected;
        }
        if last_activity.elapsed() >= quiescence {
            return collected;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Wait at most `max_wait` for any new bytes; returns as soon as something
/// arrives rather than waiting out a silence window.
pub fn poll(session: &SessionInner, max_wait: Duration) -> Vec<u8> {
    let deadline = Instant::now() + max_wait;
    loop {
        let chunk = {
            let ring = session.ring.lock();
            let mut cursor = session.ring_cursor.lock();
            ring.read_since(&mut cursor)
        };
        if !chunk.is_empty() || Instant::now() >= deadline {
            return chunk;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Outcome of `expect`: whether the pattern matched before the deadline,
/// plus the rendered text it was scanned against.
pub struct ExpectOutcome {
    pub matched: bool,
    pub text: String,
}

/// Scan the rendered scrollback+screen for `pattern`; if it isn't present
/// yet, wait for new output and re-scan after each arrival, up to
/// `max_wait`. Matching happens against rendered text, never raw bytes, so
/// an escape sequence can't accidentally spoof a match.
pub fn expect(session: &SessionInner, pattern: &Regex, max_wait: Duration) -> ExpectOutcome {
    let deadline = Instant::now() + max_wait;

    loop {
        let text = rendered_text(session);
        if pattern.is_match(&text) {
            return ExpectOutcome { matched: true, text };
        }
        let now = Instant::now();
        if now >= deadline {
            return ExpectOutcome { matched: false, text };
        }
        poll(session, deadline - now);
    }
}

/// Join the scrollback and current screen into one string for pattern
/// matching against.
pub fn rendered_text(session: &SessionInner) -> String {
    let mut emulator = session.emulator.lock();
    let scrollback = emulator.scrollback(usize::MAX);
    let rendered = emulator.render();
    let mut text = scrollback.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(&rendered.lines.join("\n"));
    text
}

#[cfg(test)]
mod tests {
    // Exercised indirectly through `session::tests`, which can construct a
    // real `SessionInner` backed by an actual PTY; a bare unit test here
    // would need the same scaffolding for no extra coverage.
}

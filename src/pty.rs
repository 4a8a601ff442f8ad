//! PTY channel: spawns a child process behind a pseudo-terminal and gives
//! the ingestion loop non-blocking reads plus a way to write input and
//! deliver signals.
//!
//! Grounded in the teacher's `terminal::{TerminalSession, PtyMaster}`
//! (`native_pty_system`, `CommandBuilder`, raw-fd duplication) and
//! generalized per `SPEC_FULL.md` section 4.1 with: configurable
//! rows/cols/cmd/cwd/env instead of a hardcoded 80x24 shell, real
//! non-blocking reads via `O_NONBLOCK` on the duplicated master fd (the
//! other_examples `PtyHandle` reference shows this is the piece the
//! teacher's own channel leaves out), a working `resize`, and process-group
//! signal delivery via `nix::sys::signal` (the teacher's `close_session`
//! only ever sends a kill through `portable_pty`'s `Child::kill`).

use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::error::{Error, Result};

/// Parameters for spawning a new PTY-backed process.
pub struct SpawnSpec {
    pub cmd: String,
    pub args: Vec<String>,
    pub cols: u16,
    pub rows: u16,
    pub cwd: Option<std::path::PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Default for SpawnSpec {
    fn default() -> Self {
        SpawnSpec {
            cmd: detect_shell(),
            args: Vec::new(),
            cols: 80,
            rows: 24,
            cwd: None,
            env: Vec::new(),
        }
    }
}

/// A running PTY session: the master side plus the child process handle.
pub struct PtyChannel {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    reader: Box<dyn Read + Send>,
    child: Box<dyn Child + Send + Sync>,
    pid: i32,
    rows: u16,
    cols: u16,
}

impl PtyChannel {
    /// Spawn a new process behind a fresh PTY.
    pub fn spawn(spec: SpawnSpec) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: spec.rows,
                cols: spec.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::SpawnError(format!("openpty failed: {e}")))?;

        let mut cmd = CommandBuilder::new(&spec.cmd);
        cmd.args(&spec.args);
        if let Some(cwd) = &spec.cwd {
            cmd.cwd(cwd);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }
        if !spec.env.iter().any(|(k, _)| k == "TERM") {
            cmd.env("TERM", "xterm-256color");
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| Error::SpawnError(format!("spawn failed: {e}")))?;
        let pid = child
            .process_id()
            .ok_or_else(|| Error::SpawnError("child has no pid".into()))? as i32;

        // portable_pty doesn't hand out Clone-able readers; this one is put
        // in non-blocking mode and held for the channel's whole lifetime so
        // the ingestion loop can poll it without blocking, while `master`
        // stays usable for resize.
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| Error::SpawnError(format!("clone reader failed: {e}")))?;
        set_nonblocking(reader.as_raw_fd())?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| Error::SpawnError(format!("take writer failed: {e}")))?;

        drop(pair.slave);

        Ok(PtyChannel {
            master: pair.master,
            writer,
            reader,
            child,
            pid,
            rows: spec.rows,
            cols: spec.cols,
        })
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn dimensions(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Write raw bytes to the child's stdin (the PTY slave's line discipline
    /// sees these as keyboard input).
    pub fn write_input(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Non-blocking read: returns whatever bytes are currently available
    /// without blocking, which may be empty. `WouldBlock` is mapped to an
    /// empty read rather than an error, matching the teacher's
    /// `read_output`.
    pub fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.reader.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(Error::IoError(e)),
        }
    }

    /// Read until either `deadline` elapses or `quiescence` has passed
    /// since the last byte arrived, appending everything read into `out`.
    /// Returns once quiescent or once the deadline is hit; the caller
    /// decides what that means for status.
    pub fn read_until_quiescent(
        &mut self,
        out: &mut Vec<u8>,
        quiescence: Duration,
        deadline: Instant,
    ) -> Result<()> {
        let mut buf = [0u8; 8192];
        let mut last_activity = Instant::now();
        loop {
            let n = self.read_nonblocking(&mut buf)?;
            if n > 0 {
                out.extend_from_slice(&buf[..n]);
                last_activity = Instant::now();
                continue;
            }
            if !self.is_running() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Ok(());
            }
            if last_activity.elapsed() >= quiescence {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;
        self.cols = cols;
        self.rows = rows;
        Ok(())
    }

    /// Deliver a signal to the whole foreground process group, the way a
    /// real terminal's line discipline would on Ctrl-C/Ctrl-\.
    pub fn signal(&self, sig: nix::sys::signal::Signal) -> Result<()> {
        use nix::unistd::Pid;
        nix::sys::signal::killpg(Pid::from_raw(self.pid), sig)
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Terminate the child: SIGHUP first (what a closed terminal sends),
    /// then SIGKILL after a grace period if it's still alive, then reap.
    pub fn close(&mut self, grace: Duration) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        let _ = self.signal(nix::sys::signal::Signal::SIGHUP);
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if !self.is_running() {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        if self.is_running() {
            let _ = self.signal(nix::sys::signal::Signal::SIGKILL);
        }
        let _ = self.child.wait();
        Ok(())
    }
}

fn set_nonblocking(fd: RawFd) -> Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(Error::IoError(std::io::Error::last_os_error()));
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(Error::IoError(std::io::Error::last_os_error()));
        }
    }
    Ok(())
}

/// Mirror the teacher's `detect_shell`: `$SHELL`, then `/bin/bash`, then
/// `/bin/sh`.
pub fn detect_shell() -> String {
    if let Ok(shell) = std::env::var("SHELL") {
        if !shell.is_empty() {
            return shell;
        }
    }
    if std::path::Path::new("/bin/bash").exists() {
        return "/bin/bash".to_string();
    }
    "/bin/sh".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_echo_and_read() {
        let spec = SpawnSpec {
            cmd: "/bin/sh".into(),
            args: vec!["-c".into(), "echo hi; sleep 0.2".into()],
            ..Default::default()
        };
        let mut channel = PtyChannel::spawn(spec).expect("spawn");
        let mut out = Vec::new();
        channel
            .read_until_quiescent(&mut out, Duration::from_millis(150), Instant::now() + Duration::from_secs(2))
            .expect("read");
        assert!(String::from_utf8_lossy(&out).contains("hi"));
        channel.close(Duration::from_millis(200)).unwrap();
    }

    #[test]
    fn write_input_is_echoed() {
        let spec = SpawnSpec {
            cmd: "/bin/cat".into(),
            args: vec![],
            ..Default::default()
        };
        let mut channel = PtyChannel::spawn(spec).expect("spawn");
        channel.write_input(b"hello\n").unwrap();
        let mut out = Vec::new();
        channel
            .read_until_quiescent(&mut out, Duration::from_millis(150), Instant::now() + Duration::from_secs(2))
            .expect("read");
        assert!(String::from_utf8_lossy(&out).contains("hello"));
        channel.close(Duration::from_millis(200)).unwrap();
    }

    #[test]
    fn close_terminates_child() {
        let spec = SpawnSpec {
            cmd: "/bin/sleep".into(),
            args: vec!["30".into()],
            ..Default::default()
        };
        let mut channel = PtyChannel::spawn(spec).expect("spawn");
        assert!(channel.is_running());
        channel.close(Duration::from_millis(200)).unwrap();
        assert!(!channel.is_running());
    }
}

//! Tight-timeout smoke tests, mirroring the teacher's
//! `tests/terminal_fast.rs` split: fast sanity checks meant to run on
//! every commit, leaving slower end-to-end scenarios to
//! `session_integration.rs`.

use std::time::Duration;

use piloty::{Config, Registry, SessionOptions, Status};

fn test_registry() -> (Registry, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = Config::default();
    config.root = dir.path().to_path_buf();
    (Registry::new(config), dir)
}

#[test]
fn spawn_and_echo() {
    let (registry, _dir) = test_registry();
    let mut options = SessionOptions::new("fast-echo");
    options.cmd = Some("/bin/sh".into());
    let session = registry.create(options).unwrap();

    let response = session.run("echo hi", Duration::from_secs(2), true).unwrap();
    assert!(response.output.contains("hi"));
    assert_ne!(response.status, Status::Terminated);

    session.terminate().unwrap();
}

#[test]
fn terminate_is_idempotent() {
    let (registry, _dir) = test_registry();
    let mut options = SessionOptions::new("fast-terminate");
    options.cmd = Some("/bin/sh".into());
    let session = registry.create(options).unwrap();

    let first = session.terminate().unwrap();
    let second = session.terminate().unwrap();
    assert_eq!(first.status, Status::Terminated);
    assert_eq!(second.status, Status::Terminated);
}

#[test]
fn unknown_session_id_errors() {
    let (registry, _dir) = test_registry();
    assert!(registry.get("does-not-exist").is_err());
}

#[test]
fn poll_output_never_exceeds_its_deadline() {
    let (registry, _dir) = test_registry();
    let mut options = SessionOptions::new("fast-poll");
    options.cmd = Some("/bin/sh".into());
    let session = registry.create(options).unwrap();

    std::thread::sleep(Duration::from_millis(300));
    let start = std::time::Instant::now();
    let _ = session.poll_output(Duration::from_millis(300), true).unwrap();
    assert!(start.elapsed() < Duration::from_millis(600));

    session.terminate().unwrap();
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mcmdd_core::{ExitMode, Status};
use std::time::Instant;

/// Poll a session until a predicate holds.
async fn wait_for(session: &ServerSession, what: &str, pred: impl Fn(&ServerSession) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !pred(session) {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn join(handle: JoinHandle<()>) {
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("supervisor did not terminate")
        .expect("supervisor panicked");
}

fn shell_session(script: &str) -> Arc<ServerSession> {
    Arc::new(ServerSession::new(
        "alpha",
        "",
        &format!("/bin/sh -c {}", script.replace(' ', "\\ ")),
    ))
}

#[tokio::test]
async fn done_line_marks_running() {
    let session = shell_session("echo Done; exec sleep 1000");
    let handle = spawn(Arc::clone(&session), Duration::ZERO);

    wait_for(&session, "running", |s| s.status() == Status::Running).await;
    assert!(session.snapshot(None).iter().any(|l| l.contains("Done")));

    session.kill(ExitMode::Full).expect("kill failed");
    join(handle).await;
    assert_eq!(session.status(), Status::Stopped);
}

#[tokio::test]
async fn no_done_line_stays_starting() {
    let session = shell_session("exec sleep 1000");
    let handle = spawn(Arc::clone(&session), Duration::ZERO);

    wait_for(&session, "spawn", |s| s.status() == Status::Starting).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.status(), Status::Starting);

    session.kill(ExitMode::Full).expect("kill failed");
    join(handle).await;
}

#[tokio::test]
async fn quick_exit_triggers_warmup_pause() {
    let session = shell_session("true");
    let handle = spawn(Arc::clone(&session), Duration::from_secs(10));

    wait_for(&session, "pause", |s| {
        s.status() == Status::Stopped && s.ctrl() == mcmdd_core::Ctrl::Pause
    })
    .await;

    // no respawn while parked
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(session.status(), Status::Stopped);
    assert!(!handle.is_finished());

    // a launch request spawns again; the child quits and we park once more
    session.resume();
    wait_for(&session, "second pause", |s| {
        s.ctrl() == mcmdd_core::Ctrl::Pause
    })
    .await;

    session.kill(ExitMode::Full).ok();
    join(handle).await;
}

#[tokio::test]
async fn shutdown_command_stops_a_cooperative_child() {
    let session = shell_session("read line; exit 0");
    let handle = spawn(Arc::clone(&session), Duration::ZERO);

    wait_for(&session, "spawn", |s| s.status() == Status::Starting).await;
    session.stop(ExitMode::Full);

    join(handle).await;
    assert_eq!(session.status(), Status::Stopped);
    assert!(session
        .snapshot(None)
        .iter()
        .any(|l| l == crate::session::SHUTDOWN_COMMAND));
}

#[tokio::test]
async fn stop_kill_escalates_within_the_bound() {
    let session = shell_session("exec sleep 1000");
    let handle = spawn(Arc::clone(&session), Duration::ZERO);

    wait_for(&session, "spawn", |s| s.status() == Status::Starting).await;

    let started = Instant::now();
    session
        .stop_kill(ExitMode::Full, Duration::from_millis(500))
        .await;
    assert!(started.elapsed() < Duration::from_secs(4));

    join(handle).await;
    assert_eq!(session.status(), Status::Stopped);
    assert!(session
        .snapshot(None)
        .iter()
        .any(|l| l == "Server process killed"));
}

#[tokio::test]
async fn spawn_failure_is_a_transient_error() {
    let session = Arc::new(ServerSession::new("alpha", "", "/nonexistent/binary"));
    assert!(run_once(&session).await.is_err());
    assert_eq!(session.status(), Status::Stopped);
}

#[tokio::test]
async fn empty_command_is_a_spawn_error() {
    let session = Arc::new(ServerSession::new("alpha", "", ""));
    assert!(run_once(&session).await.is_err());
}

#[tokio::test]
async fn capped_reader_splits_on_newline() {
    let mut reader = BufReader::new(&b"one\ntwo\n"[..]);
    assert_eq!(
        read_line_capped(&mut reader, 16).await.unwrap().as_deref(),
        Some("one")
    );
    assert_eq!(
        read_line_capped(&mut reader, 16).await.unwrap().as_deref(),
        Some("two")
    );
    assert_eq!(read_line_capped(&mut reader, 16).await.unwrap(), None);
}

#[tokio::test]
async fn capped_reader_emits_long_lines_in_chunks() {
    let data = vec![b'x'; 20];
    let mut reader = BufReader::new(&data[..]);
    assert_eq!(
        read_line_capped(&mut reader, 16).await.unwrap().as_deref(),
        Some("x".repeat(16).as_str())
    );
    assert_eq!(
        read_line_capped(&mut reader, 16).await.unwrap().as_deref(),
        Some("xxxx")
    );
}

#[tokio::test]
async fn capped_reader_flushes_trailing_line_at_eof() {
    let mut reader = BufReader::new(&b"no newline"[..]);
    assert_eq!(
        read_line_capped(&mut reader, 16).await.unwrap().as_deref(),
        Some("no newline")
    );
}

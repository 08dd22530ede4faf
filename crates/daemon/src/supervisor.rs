// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor loop: (re)spawns one child, captures its output line by
//! line, and applies the control intents left by other tasks.
//!
//! Each pass spawns the child with piped stdio, mirrors every output line
//! to the daemon's stdout with the `[{id}] #{n}:` prefix, and watches for
//! the start-complete marker. After the child exits the loop reads `ctrl`
//! once and either terminates, parks until a launch request, or respawns.
//! A child that exits before its warm-up time is treated as crash-looping
//! and parked rather than respawned.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use mcmdd_core::{Ctrl, LINE_MAX};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::session::ServerSession;

/// Start the supervisor task for one session.
pub fn spawn(session: Arc<ServerSession>, warmup: Duration) -> JoinHandle<()> {
    tokio::spawn(run(session, warmup))
}

async fn run(session: Arc<ServerSession>, warmup: Duration) {
    loop {
        session.set_ctrl(Ctrl::Clean);
        if let Err(err) = run_once(&session).await {
            println!("[{}] Failed to start: {}", session.id(), err);
            session.append_note(&format!("Failed to start: {}", err));
        }
        match session.ctrl() {
            // the daemon is taking this supervisor down
            Ctrl::Exit => return,
            Ctrl::Clean if session.lived() < warmup => {
                println!(
                    "[{}] Paused - failed to keep server running long enough.",
                    session.id()
                );
                session.set_ctrl(Ctrl::Pause);
            }
            _ => {}
        }
        if session.ctrl() == Ctrl::Pause && !session.wait_for_launch().await {
            return;
        }
    }
}

/// One spawn-to-exit pass.
async fn run_once(session: &ServerSession) -> io::Result<()> {
    let argv = session.argv();
    let Some(program) = argv.first() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
    };

    session.mark_spawn_attempt();

    let mut cmd = Command::new(program);
    cmd.args(&argv[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if !session.workdir().is_empty() {
        cmd.current_dir(session.workdir());
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            session.mark_stopped();
            return Err(err);
        }
    };
    let pid = child.id().unwrap_or_default();

    let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<String>();
    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            while let Some(message) = stdin_rx.recv().await {
                if stdin.write_all(message.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });
    }

    session.mark_spawned(pid, stdin_tx);
    println!("[{}] Starting on PID {}.", session.id(), pid);

    // stdout and stderr feed one channel so the console stays a single
    // ordered stream of lines
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(read_lines(stdout, line_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(read_lines(stderr, line_tx.clone()));
    }
    drop(line_tx);

    while let Some(line) = line_rx.recv().await {
        let n = session.record_line(&line);
        println!("[{}] #{}: {}", session.id(), n, line);
    }

    let exit = child.wait().await;
    session.mark_stopped();
    match exit {
        Ok(status) => println!("[{}] PID {} exited with {}.", session.id(), pid, status),
        Err(err) => warn!(server = session.id(), %err, "failed to reap child"),
    }
    Ok(())
}

/// Pump one output stream into the line channel until EOF.
async fn read_lines<R: AsyncRead + Unpin>(stream: R, lines: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_line_capped(&mut reader, LINE_MAX).await {
            Ok(Some(line)) => {
                if lines.send(line).is_err() {
                    return;
                }
            }
            Ok(None) | Err(_) => return,
        }
    }
}

/// Read one line, emitting early once `cap` bytes have accumulated so a
/// long line is published without waiting for its newline.
async fn read_line_capped<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    cap: usize,
) -> io::Result<Option<String>> {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let (consumed, line) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if buf.is_empty() {
                    return Ok(None);
                }
                (0, Some(std::mem::take(&mut buf)))
            } else {
                let window = &available[..available.len().min(cap - buf.len())];
                match window.iter().position(|&b| b == b'\n') {
                    Some(pos) => {
                        buf.extend_from_slice(&window[..pos]);
                        (pos + 1, Some(std::mem::take(&mut buf)))
                    }
                    None => {
                        buf.extend_from_slice(window);
                        let done = buf.len() >= cap;
                        (window.len(), done.then(|| std::mem::take(&mut buf)))
                    }
                }
            }
        };
        reader.consume(consumed);
        if let Some(bytes) = line {
            return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

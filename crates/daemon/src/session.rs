// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-child session state and the control operations other tasks may
//! invoke against it.
//!
//! A session is owned by exactly one supervisor task for its lifetime; the
//! supervisor writes most fields, while control connections and the backup
//! scheduler only touch `ctrl` and `status` through the operations below.
//! All mutable state sits behind one mutex that is never held across an
//! await point; the supervisor is woken from its pause wait through a
//! [`Notify`] rather than a sleep poll.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mcmdd_core::{tokenize, Config, Ctrl, ExitMode, RingLog, Status};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};

/// Console command that asks a child to shut itself down.
pub const SHUTDOWN_COMMAND: &str = "stop\n";

/// Longest we wait for a child to honor the shutdown command before
/// escalating to SIGKILL.
pub const MAX_WAIT: Duration = Duration::from_secs(60);

/// Errors from [`ServerSession::send`].
#[derive(Debug, Error)]
pub enum SendError {
    #[error("server is off")]
    Stopped,
}

/// Errors from [`ServerSession::kill`].
#[derive(Debug, Error)]
pub enum KillError {
    #[error("server is not running")]
    NotRunning,
}

/// Fields written during operation, all behind one lock.
struct Inner {
    status: Status,
    ctrl: Ctrl,
    pid: Option<u32>,
    stdin: Option<mpsc::UnboundedSender<String>>,
    start: Instant,
    last_read: Instant,
    log: RingLog,
}

/// One managed child: identity, spawn parameters, and live state.
pub struct ServerSession {
    id: String,
    workdir: String,
    argv: Vec<String>,
    inner: Mutex<Inner>,
    ctrl_notify: Notify,
}

impl ServerSession {
    pub fn new(id: impl Into<String>, workdir: impl Into<String>, command: &str) -> Self {
        let now = Instant::now();
        Self {
            id: id.into(),
            workdir: workdir.into(),
            argv: tokenize(command),
            inner: Mutex::new(Inner {
                status: Status::Stopped,
                ctrl: Ctrl::Clean,
                pid: None,
                stdin: None,
                start: now,
                last_read: now,
                log: RingLog::new(),
            }),
            ctrl_notify: Notify::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn workdir(&self) -> &str {
        &self.workdir
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn status(&self) -> Status {
        self.inner.lock().status
    }

    /// Seconds since the most recent spawn.
    pub fn uptime_secs(&self) -> f64 {
        self.inner.lock().start.elapsed().as_secs_f64()
    }

    /// Tail of recent console lines; with a hint, only lines newer than the
    /// one the client last saw (see [`RingLog::snapshot_since`]).
    pub fn snapshot(&self, hint: Option<&str>) -> Vec<String> {
        let inner = self.inner.lock();
        match hint {
            Some(hint) => inner.log.snapshot_since(hint),
            None => inner.log.snapshot(),
        }
    }

    /// Echo `message` into the console tail and forward it to the child's
    /// stdin. The caller supplies any trailing newline. Write failures past
    /// the hand-off are not reported, matching pipe semantics.
    pub fn send(&self, message: &str) -> Result<(), SendError> {
        let stdin = {
            let mut inner = self.inner.lock();
            if inner.status == Status::Stopped {
                return Err(SendError::Stopped);
            }
            inner.log.append(message);
            inner.stdin.clone()
        };
        print!("[{}] < {}", self.id, message);
        if let Some(tx) = stdin {
            let _ = tx.send(message.to_string());
        }
        Ok(())
    }

    /// Request a stop: record the exit intent, then send the shutdown
    /// command if a child is live.
    pub fn stop(&self, mode: ExitMode) {
        let live = {
            let mut inner = self.inner.lock();
            if let Some(ctrl) = mode.ctrl() {
                inner.ctrl = ctrl;
            }
            if inner.status == Status::Stopped {
                false
            } else {
                inner.status = Status::Stopping;
                true
            }
        };
        self.ctrl_notify.notify_one();
        if live {
            let _ = self.send(SHUTDOWN_COMMAND);
        }
    }

    /// [`stop`](Self::stop), then poll until the child is gone, escalating
    /// to [`kill`](Self::kill) once `max_wait` has elapsed.
    pub async fn stop_kill(&self, mode: ExitMode, max_wait: Duration) {
        self.stop(mode);
        println!(
            "[{}] Waiting (max {} seconds) for server to stop.",
            self.id,
            max_wait.as_secs()
        );
        let poll = crate::env::stop_poll_interval();
        let mut waited = Duration::ZERO;
        while self.status() == Status::Stopping {
            tokio::time::sleep(poll).await;
            waited += poll;
            if waited > max_wait {
                let _ = self.kill(mode);
                break;
            }
        }
    }

    /// Record the exit intent and SIGKILL the child.
    pub fn kill(&self, mode: ExitMode) -> Result<(), KillError> {
        let pid = {
            let mut inner = self.inner.lock();
            if let Some(ctrl) = mode.ctrl() {
                inner.ctrl = ctrl;
            }
            if inner.status == Status::Stopped {
                self.ctrl_notify.notify_one();
                return Err(KillError::NotRunning);
            }
            // the recorded pid is only trustworthy while a child is live
            let pid = matches!(
                inner.status,
                Status::Starting | Status::Running | Status::Stopping
            )
            .then_some(inner.pid)
            .flatten();
            inner.status = Status::Stopped;
            inner.log.append("Server process killed");
            pid
        };
        self.ctrl_notify.notify_one();
        if let Some(pid) = pid {
            println!("[{}] Killing server process {}", self.id, pid);
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGKILL,
            );
        }
        Ok(())
    }

    /// Ask a paused supervisor to spawn again. Ignored while a backup holds
    /// the session quiesced.
    pub fn resume(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.status == Status::Backup {
                return;
            }
            inner.ctrl = Ctrl::Launch;
        }
        self.ctrl_notify.notify_one();
    }

    /// Toggle the backup interlock. The caller must have stopped the child
    /// already; while set, [`resume`](Self::resume) is a no-op.
    pub fn set_backup(&self, flag: bool) {
        let mut inner = self.inner.lock();
        inner.status = if flag { Status::Backup } else { Status::Stopped };
    }

    // ---- supervisor side ----

    pub(crate) fn ctrl(&self) -> Ctrl {
        self.inner.lock().ctrl
    }

    pub(crate) fn set_ctrl(&self, ctrl: Ctrl) {
        self.inner.lock().ctrl = ctrl;
    }

    /// Time the current (or last) child has been alive.
    pub(crate) fn lived(&self) -> Duration {
        self.inner.lock().start.elapsed()
    }

    /// Called before the fork: the spawn timestamp and STARTING status are
    /// visible to other tasks even if the exec itself fails.
    pub(crate) fn mark_spawn_attempt(&self) {
        let mut inner = self.inner.lock();
        inner.status = Status::Starting;
        inner.start = Instant::now();
    }

    pub(crate) fn mark_spawned(&self, pid: u32, stdin: mpsc::UnboundedSender<String>) {
        let mut inner = self.inner.lock();
        inner.pid = Some(pid);
        inner.stdin = Some(stdin);
    }

    pub(crate) fn mark_stopped(&self) {
        let mut inner = self.inner.lock();
        inner.status = Status::Stopped;
        inner.pid = None;
        inner.stdin = None;
    }

    /// Record one line of child output. Returns the 1-based slot position
    /// for the console mirror prefix.
    pub(crate) fn record_line(&self, line: &str) -> usize {
        let mut inner = self.inner.lock();
        let n = inner.log.append(line);
        if inner.status == Status::Starting && line.contains("Done") {
            inner.status = Status::Running;
        }
        inner.last_read = Instant::now();
        n
    }

    /// Append a synthetic line to the console tail without touching the
    /// status machine.
    pub(crate) fn append_note(&self, line: &str) {
        self.inner.lock().log.append(line);
    }

    /// Park until control tells us to launch again (`true`) or exit
    /// (`false`). The notified future is created before the control check
    /// so a wakeup between the two is not lost.
    pub(crate) async fn wait_for_launch(&self) -> bool {
        loop {
            let notified = self.ctrl_notify.notified();
            match self.ctrl() {
                Ctrl::Exit => return false,
                Ctrl::Launch => return true,
                _ => {}
            }
            notified.await;
        }
    }
}

/// Immutable id → session table, built once at startup and shared by the
/// listener, the backup scheduler, and shutdown.
pub struct Registry {
    sessions: Vec<Arc<ServerSession>>,
}

impl Registry {
    /// Build one session per id in the config's `servers` list.
    pub fn from_config(config: &Config) -> Self {
        let sessions = config
            .servers()
            .into_iter()
            .map(|id| {
                println!("[{}] Loading", id);
                Arc::new(ServerSession::new(
                    id,
                    config.server_path(id),
                    config.server_command(id),
                ))
            })
            .collect();
        Self { sessions }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ServerSession>> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    pub fn sessions(&self) -> &[Arc<ServerSession>] {
        &self.sessions
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

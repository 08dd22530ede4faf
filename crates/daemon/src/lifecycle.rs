// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, daemonization, shutdown.

use std::sync::Arc;
use std::time::Duration;

use mcmdd_core::{Config, ConfigError, ExitMode};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};

use crate::backup;
use crate::session::{Registry, MAX_WAIT};
use crate::supervisor;

/// Errors that are fatal at startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no servers list found in config")]
    NoServers,

    #[error("failed to bind control port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },

    #[error("user {0} not found")]
    UnknownUser(String),

    #[error("failed to drop privileges: {0}")]
    Privileges(nix::Error),

    #[error("failed to daemonize: {0}")]
    Daemonize(std::io::Error),
}

/// Daemon state during operation.
///
/// The listener is returned separately from startup so the accept loop can
/// be spawned as its own task.
pub struct DaemonState {
    pub config: Arc<Config>,
    pub registry: Arc<Registry>,
    supervisors: Vec<JoinHandle<()>>,
    backup: JoinHandle<()>,
}

/// Result of daemon startup.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: TcpListener,
}

/// Bring the daemon up: bind the control port, build the session registry,
/// start one supervisor per child and the backup scheduler.
pub async fn startup(config: Config) -> Result<StartupResult, LifecycleError> {
    let port = config.port()?;
    if config.servers().is_empty() {
        return Err(LifecycleError::NoServers);
    }
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|source| LifecycleError::Bind { port, source })?;

    let config = Arc::new(config);
    let registry = Arc::new(Registry::from_config(&config));

    let supervisors = registry
        .sessions()
        .iter()
        .map(|session| {
            let warmup = Duration::from_secs(config.warmup(session.id()));
            supervisor::spawn(Arc::clone(session), warmup)
        })
        .collect();

    let backup = tokio::spawn(backup::run(Arc::clone(&registry), Arc::clone(&config)));

    Ok(StartupResult {
        daemon: DaemonState {
            config,
            registry,
            supervisors,
            backup,
        },
        listener,
    })
}

impl DaemonState {
    /// Graceful shutdown: ask every child to stop, escalate to SIGKILL at
    /// the usual bound, and join every supervisor.
    pub async fn stop_all(&mut self) {
        println!("[daemon] Stopping all servers");
        let mut stops = JoinSet::new();
        for session in self.registry.sessions() {
            let session = Arc::clone(session);
            stops.spawn(async move { session.stop_kill(ExitMode::Full, MAX_WAIT).await });
        }
        while stops.join_next().await.is_some() {}
        self.join_supervisors().await;
        self.backup.abort();
    }

    /// Emergency shutdown: SIGKILL every child immediately.
    pub async fn kill_all(&mut self) {
        println!("[daemon] Killing all servers");
        for session in self.registry.sessions() {
            let _ = session.kill(ExitMode::Full);
        }
        self.join_supervisors().await;
        self.backup.abort();
    }

    async fn join_supervisors(&mut self) {
        for handle in self.supervisors.drain(..) {
            let _ = handle.await;
        }
    }
}

/// Drop to the named user (setgid, then setuid).
pub fn change_user(name: &str) -> Result<(), LifecycleError> {
    let user = nix::unistd::User::from_name(name)
        .map_err(LifecycleError::Privileges)?
        .ok_or_else(|| LifecycleError::UnknownUser(name.to_string()))?;
    nix::unistd::setgid(user.gid).map_err(LifecycleError::Privileges)?;
    nix::unistd::setuid(user.uid).map_err(LifecycleError::Privileges)?;
    Ok(())
}

/// Detach into the background by re-executing ourselves in foreground mode
/// with stdio redirected to the log files.
///
/// The detached process gets its own process group, its stdout appended to
/// `mcmdd.log` and stderr to `mcmdd.err`; its pid lands in `mcmdd.pid`.
/// The caller (the parent) returns and exits 0.
pub fn daemonize() -> Result<(), LifecycleError> {
    use std::os::unix::fs::PermissionsExt;
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe().map_err(LifecycleError::Daemonize)?;
    let log = open_log("mcmdd.log")?;
    let err_log = open_log("mcmdd.err")?;

    let child = std::process::Command::new(exe)
        .arg("-n")
        .stdin(std::process::Stdio::null())
        .stdout(log)
        .stderr(err_log)
        .process_group(0)
        .spawn()
        .map_err(LifecycleError::Daemonize)?;

    std::fs::write("mcmdd.pid", format!("{}\n", child.id())).map_err(LifecycleError::Daemonize)?;
    std::fs::set_permissions("mcmdd.pid", std::fs::Permissions::from_mode(0o644))
        .map_err(LifecycleError::Daemonize)?;
    Ok(())
}

fn open_log(path: &str) -> Result<std::fs::File, LifecycleError> {
    use std::os::unix::fs::PermissionsExt;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(LifecycleError::Daemonize)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(LifecycleError::Daemonize)?;
    Ok(file)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

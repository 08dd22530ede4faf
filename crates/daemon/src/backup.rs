// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offline backup scheduler.
//!
//! One pass per minute of wall clock. A child is due when the minute
//! counter is a multiple of its `backup_frequency`; a due child is
//! quiesced with the usual stop-then-kill bound, locked behind the backup
//! interlock so a control client cannot restart it mid-archive, archived
//! through the configured shell command, then unlocked and resumed. A
//! failed archive is logged and never prevents the resume.

use std::sync::Arc;
use std::time::Duration;

use mcmdd_core::{Config, ExitMode};
use tracing::warn;

use crate::session::{Registry, ServerSession, MAX_WAIT};

/// Root directory for backup artifacts, relative to the data dir.
const BACKUP_DIRECTORY: &str = "backups";

/// strftime pattern for the per-backup artifact name.
const BACKUP_DATE: &str = "%Y-%m-%d_%H-%M-%S";

/// Scheduler task: one pass per minute until aborted at shutdown.
pub(crate) async fn run(registry: Arc<Registry>, config: Arc<Config>) {
    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        let now = chrono::Local::now();
        let tmin = now.timestamp() / 60;
        let name = now.format(BACKUP_DATE).to_string();
        for session in due_sessions(&registry, &config, tmin) {
            backup_one(session, &config, &name).await;
        }
    }
}

/// Sessions whose backup frequency matches this minute.
pub(crate) fn due_sessions<'a>(
    registry: &'a Registry,
    config: &Config,
    tmin: i64,
) -> Vec<&'a Arc<ServerSession>> {
    registry
        .sessions()
        .iter()
        .filter(|session| {
            let freq = config.backup_frequency(session.id());
            // a frequency of 30 runs on every half-hour boundary
            freq != 0 && tmin % freq as i64 == 0
        })
        .collect()
}

/// Quiesce, archive, and resume one child.
async fn backup_one(session: &ServerSession, config: &Config, name: &str) {
    let folder = format!("{}/{}", BACKUP_DIRECTORY, session.id());
    if let Err(err) = std::fs::create_dir_all(&folder) {
        warn!(server = session.id(), %err, "failed to make backup directory");
        return;
    }
    let target = format!("{}/{}", folder, name);
    let command = expand_template(config.backup_command(), &[&target, session.id()]);

    session.stop_kill(ExitMode::Pause, MAX_WAIT).await;
    session.set_backup(true);

    println!("[{}] Running scheduled backup.", session.id());
    println!("[{}] >{}", session.id(), command);
    match tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&command)
        .status()
        .await
    {
        Ok(status) if status.success() => println!("[{}] Backup succeeded!", session.id()),
        Ok(status) => println!(
            "[{}] Backup failed with code {}.",
            session.id(),
            status.code().unwrap_or(-1)
        ),
        Err(err) => warn!(server = session.id(), %err, "failed to run backup command"),
    }

    session.set_backup(false);
    session.resume();
}

/// Substitute each `%s` in the archiver template with the next argument,
/// printf-style. Placeholders beyond the argument list are left as-is.
pub(crate) fn expand_template(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut args = args.iter();
    while let Some(pos) = rest.find("%s") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("%s"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mcmdd
//!
//! Supervisor daemon for line-oriented game/application servers.
//!
//! Architecture:
//! - Supervisor tasks: one per configured child, (re)spawning it and
//!   capturing its console into a ring buffer
//! - Listener task: accepts control connections on the TCP port and
//!   spawns a handler per client
//! - Backup task: quiesces and archives children on their schedule
//!
//! The main task only installs signal handlers and waits: SIGINT runs a
//! graceful stop of every child, SIGTERM an immediate kill.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod backup;
mod env;
mod lifecycle;
mod listener;
mod protocol;
mod session;
mod supervisor;

use std::process::ExitCode;
use std::sync::Arc;

use mcmdd_core::Config;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use crate::lifecycle::StartupResult;
use crate::listener::{ListenCtx, Listener};

const CONFIG_FILE: &str = "mcmdd.conf";

struct Options {
    foreground: bool,
    data_dir: Option<String>,
    user: Option<String>,
}

fn usage(program: &str) -> ExitCode {
    eprintln!("usage: {} [-nf] [-d path] [-u user]", program);
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("mcmdd");

    let mut options = Options {
        foreground: true,
        data_dir: None,
        user: None,
    };
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-n" => options.foreground = true,
            "-f" => options.foreground = false,
            "-d" => match iter.next() {
                Some(path) => options.data_dir = Some(path.clone()),
                None => return usage(program),
            },
            "-u" => match iter.next() {
                Some(name) => options.user = Some(name.clone()),
                None => return usage(program),
            },
            "-V" | "--version" => {
                println!("mcmdd {}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            "-h" | "--help" => {
                println!("mcmdd {}", env!("CARGO_PKG_VERSION"));
                println!("Supervisor daemon for line-oriented game/application servers.");
                println!();
                println!("USAGE:");
                println!("    {} [-nf] [-d path] [-u user]", program);
                println!();
                println!("OPTIONS:");
                println!("    -n    Stay in the foreground (default)");
                println!("    -f    Fork to the background, logging to mcmdd.log/mcmdd.err");
                println!("    -d    Change to this data dir before loading mcmdd.conf");
                println!("    -u    Drop privileges to this user");
                return ExitCode::SUCCESS;
            }
            _ => return usage(program),
        }
    }

    if let Some(dir) = &options.data_dir {
        if let Err(err) = std::env::set_current_dir(dir) {
            eprintln!("{}: failed to open data dir {}: {}", program, dir, err);
            return ExitCode::FAILURE;
        }
    }

    if let Some(name) = &options.user {
        if let Err(err) = lifecycle::change_user(name) {
            eprintln!("{}: {}", program, err);
            return ExitCode::FAILURE;
        }
    }

    if !options.foreground {
        // the detached copy re-enters main with -n; this process is done
        return match lifecycle::daemonize() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{}: {}", program, err);
                ExitCode::FAILURE
            }
        };
    }

    run(program).await
}

async fn run(program: &str) -> ExitCode {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::load(CONFIG_FILE) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}: failed to load config: {}", program, err);
            return ExitCode::FAILURE;
        }
    };

    let StartupResult {
        mut daemon,
        listener,
    } = match lifecycle::startup(config).await {
        Ok(result) => result,
        Err(err) => {
            eprintln!("{}: {}", program, err);
            return ExitCode::FAILURE;
        }
    };

    let ctx = Arc::new(ListenCtx {
        registry: Arc::clone(&daemon.registry),
        config: Arc::clone(&daemon.config),
        read_timeout: env::read_timeout(),
    });
    tokio::spawn(Listener::new(listener, ctx).run());

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(err), _) | (_, Err(err)) => {
            eprintln!("{}: failed to install signal handlers: {}", program, err);
            return ExitCode::FAILURE;
        }
    };

    info!("daemon ready");

    // SIGCHLD needs no handler: supervisors reap their own children
    tokio::select! {
        _ = sigint.recv() => {
            println!("[daemon] Caught SIGINT.");
            daemon.stop_all().await;
        }
        _ = sigterm.recv() => {
            println!("[daemon] Caught SIGTERM.");
            daemon.kill_all().await;
        }
    }

    println!("[daemon] Cleaning up");
    // a signal-initiated shutdown reports failure, same as the listener
    // never having run at all
    ExitCode::FAILURE
}

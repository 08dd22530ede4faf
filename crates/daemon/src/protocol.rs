// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control wire protocol: line framing limits, command parsing, the literal
//! response strings, and the auth validity predicate.
//!
//! The protocol is plaintext ASCII over TCP, one LF-terminated command per
//! line. Responses are fixed literals so remote clients can match on them
//! exactly.

use std::time::Duration;

use mcmdd_core::Config;

/// Greeting written to every accepted connection.
pub const BANNER: &str = concat!("mcmdd/", env!("CARGO_PKG_VERSION"), "\n");

pub const INVALID: &str = "ERR Invalid command.\n";
pub const NEED_KEY: &str = "OK Need key.\n";
pub const NEED_SERVER: &str = "OK Need server.\n";
pub const BAD_LOGIN: &str = "ERR Bad login.\n";
pub const LOGGED_IN: &str = "OK Logged in.\n";
pub const INTERNAL_ERROR: &str = "ERR Internal error.\n";
pub const COMMAND_SENT: &str = "OK Command sent.\n";
pub const SERVER_OFF: &str = "ERR Server is off.\n";
pub const SEND_START: &str = "OK Send start.\n";
pub const SEND_END: &str = "OK Send end.\n";

/// Maximum bytes in one request line; longer input closes the connection.
pub const LINE_LIMIT: usize = 256;

/// Default per-read timeout. A session that issued `KEEPALIVE` is exempt.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// One parsed request line.
///
/// The keyword is the text up to the first space, matched exactly; the
/// payload is the remainder of the line after that space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    /// Select the target child.
    Server(&'a str),
    /// Provide the auth credential.
    Key(&'a str),
    /// Send a console command to the child.
    Exec(&'a str),
    Kill,
    Stop,
    Restart,
    Start,
    Status,
    /// Dump the console tail, optionally resuming after a previously seen
    /// line.
    Log(Option<&'a str>),
    /// Disable read timeouts for this connection.
    Keepalive,
    Invalid,
}

impl<'a> Request<'a> {
    pub fn parse(line: &'a str) -> Self {
        let (keyword, payload) = match line.split_once(' ') {
            Some((keyword, payload)) => (keyword, Some(payload)),
            None => (line, None),
        };
        match (keyword, payload) {
            ("SERVER", Some(payload)) => Request::Server(payload),
            ("KEY", Some(payload)) => Request::Key(payload),
            ("EXEC", Some(payload)) => Request::Exec(payload),
            ("KILL", _) => Request::Kill,
            ("STOP", _) => Request::Stop,
            ("RESTART", _) => Request::Restart,
            ("START", _) => Request::Start,
            ("STATUS", _) => Request::Status,
            ("LOG", payload) => Request::Log(payload),
            ("KEEPALIVE", _) => Request::Keepalive,
            _ => Request::Invalid,
        }
    }

    /// Whether this request may be issued before authentication.
    pub fn pre_auth(&self) -> bool {
        matches!(
            self,
            Request::Server(_) | Request::Key(_) | Request::Keepalive | Request::Invalid
        )
    }
}

/// Response to the `STATUS` command.
pub fn status_line(code: u8, uptime_secs: f64) -> String {
    format!("OK Stats {} {:.0}\n", code, uptime_secs)
}

/// Whether a (key, server) pair authenticates.
///
/// Both must be present and non-empty, the id must be a token of the global
/// `servers` list, and the key a token of the id's auth tokens (per-child
/// `auth`, falling back to the global one).
pub fn valid(config: &Config, key: Option<&str>, server: Option<&str>) -> bool {
    let (Some(key), Some(server)) = (key, server) else {
        return false;
    };
    if key.is_empty() || server.is_empty() {
        return false;
    }
    if !config.servers().contains(&server) {
        return false;
    }
    config
        .auth_tokens(server)
        .split_whitespace()
        .any(|token| token == key)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;

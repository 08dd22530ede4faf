// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control listener: accepts TCP connections and drives the per-connection
//! command state machine.
//!
//! Each accepted socket gets its own task so a slow or malicious client
//! never blocks the others. A connection is closed on timeout (unless the
//! client issued `KEEPALIVE`), on an oversized line, and on any socket
//! error; all of these are local to the connection.

use std::sync::Arc;

use mcmdd_core::{Config, ExitMode};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, warn};

use crate::protocol::{self, Request};
use crate::session::{Registry, ServerSession};

/// Shared daemon context for all connection handlers.
pub(crate) struct ListenCtx {
    pub registry: Arc<Registry>,
    pub config: Arc<Config>,
    pub read_timeout: std::time::Duration,
}

/// Accept loop over the control port.
pub(crate) struct Listener {
    socket: TcpListener,
    ctx: Arc<ListenCtx>,
}

#[derive(Debug, Error)]
enum ConnectionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("read timed out")]
    Timeout,

    #[error("request line over 256 bytes")]
    Oversize,

    #[error("connection closed")]
    Closed,
}

impl Listener {
    pub fn new(socket: TcpListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Run the accept loop, spawning a task per connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, peer)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        match handle_connection(stream, &ctx).await {
                            Ok(()) | Err(ConnectionError::Closed) => {
                                debug!(%peer, "client disconnected")
                            }
                            Err(ConnectionError::Timeout) => debug!(%peer, "connection timed out"),
                            Err(err) => warn!(%peer, %err, "connection error"),
                        }
                    });
                }
                Err(err) => {
                    error!(%err, "accept error");
                }
            }
        }
    }
}

/// Drive one control connection until it closes.
async fn handle_connection(stream: TcpStream, ctx: &ListenCtx) -> Result<(), ConnectionError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    writer.write_all(protocol::BANNER.as_bytes()).await?;

    let mut key: Option<String> = None;
    let mut server: Option<String> = None;
    let mut keepalive = false;

    loop {
        let line = read_request_line(&mut reader, ctx.read_timeout, keepalive).await?;
        let request = Request::parse(&line);

        match request {
            Request::Server(name) => {
                server = Some(name.to_string());
                let reply = if protocol::valid(&ctx.config, key.as_deref(), server.as_deref()) {
                    protocol::LOGGED_IN
                } else if key.is_some() {
                    protocol::BAD_LOGIN
                } else {
                    // an unknown id answers like a missing key so the set of
                    // managed ids cannot be probed
                    protocol::NEED_KEY
                };
                writer.write_all(reply.as_bytes()).await?;
            }
            Request::Key(k) => {
                key = Some(k.to_string());
                let reply = if protocol::valid(&ctx.config, key.as_deref(), server.as_deref()) {
                    protocol::LOGGED_IN
                } else if server.is_some() {
                    protocol::BAD_LOGIN
                } else {
                    protocol::NEED_SERVER
                };
                writer.write_all(reply.as_bytes()).await?;
            }
            Request::Keepalive => keepalive = true,
            Request::Invalid => writer.write_all(protocol::INVALID.as_bytes()).await?,
            _ => {
                if !protocol::valid(&ctx.config, key.as_deref(), server.as_deref()) {
                    writer.write_all(protocol::BAD_LOGIN.as_bytes()).await?;
                    continue;
                }
                let Some(session) = ctx.registry.get(server.as_deref().unwrap_or_default()) else {
                    writer.write_all(protocol::INTERNAL_ERROR.as_bytes()).await?;
                    return Ok(());
                };
                dispatch(&request, session.as_ref(), &mut writer).await?;
            }
        }
    }
}

/// Execute one authenticated command against its target session.
async fn dispatch(
    request: &Request<'_>,
    session: &ServerSession,
    writer: &mut OwnedWriteHalf,
) -> Result<(), ConnectionError> {
    match request {
        Request::Exec(command) => {
            let message = format!("{}\n", command);
            let reply = match session.send(&message) {
                Ok(()) => protocol::COMMAND_SENT,
                Err(_) => protocol::SERVER_OFF,
            };
            writer.write_all(reply.as_bytes()).await?;
        }
        Request::Kill => {
            let reply = match session.kill(ExitMode::Pause) {
                Ok(()) => protocol::COMMAND_SENT,
                Err(_) => protocol::INTERNAL_ERROR,
            };
            writer.write_all(reply.as_bytes()).await?;
        }
        Request::Stop => {
            session.stop(ExitMode::Pause);
            writer.write_all(protocol::COMMAND_SENT.as_bytes()).await?;
        }
        Request::Restart => {
            session.stop(ExitMode::Restart);
            writer.write_all(protocol::COMMAND_SENT.as_bytes()).await?;
        }
        Request::Start => {
            session.resume();
            writer.write_all(protocol::COMMAND_SENT.as_bytes()).await?;
        }
        Request::Status => {
            let reply = protocol::status_line(session.status().code(), session.uptime_secs());
            writer.write_all(reply.as_bytes()).await?;
        }
        Request::Log(hint) => {
            writer.write_all(protocol::SEND_START.as_bytes()).await?;
            let lines = session.snapshot(*hint);
            if !lines.is_empty() {
                let mut body = lines.join("\n");
                body.push('\n');
                writer.write_all(body.as_bytes()).await?;
            }
            writer.write_all(protocol::SEND_END.as_bytes()).await?;
        }
        // SERVER / KEY / KEEPALIVE / Invalid are handled by the caller
        _ => {}
    }
    Ok(())
}

/// Read one LF-terminated request line.
///
/// Each chunk read is bounded by the timeout (disabled under keepalive);
/// lines over [`protocol::LINE_LIMIT`] bytes are an error. The limit is
/// checked before the terminator is examined, so a full-length line is
/// rejected even when its newline follows.
async fn read_request_line(
    reader: &mut BufReader<OwnedReadHalf>,
    timeout: std::time::Duration,
    keepalive: bool,
) -> Result<String, ConnectionError> {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let (consumed, done) = {
            let available = if keepalive {
                reader.fill_buf().await?
            } else {
                tokio::time::timeout(timeout, reader.fill_buf())
                    .await
                    .map_err(|_| ConnectionError::Timeout)??
            };
            if available.is_empty() {
                return Err(ConnectionError::Closed);
            }
            let mut consumed = 0;
            let mut done = None;
            for &byte in available {
                if buf.len() >= protocol::LINE_LIMIT {
                    done = Some(Err(ConnectionError::Oversize));
                    break;
                }
                consumed += 1;
                if byte == b'\n' {
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                    done = Some(Ok(String::from_utf8_lossy(&buf).into_owned()));
                    break;
                }
                buf.push(byte);
            }
            (consumed, done)
        };
        reader.consume(consumed);
        if let Some(result) = done {
            return result;
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;

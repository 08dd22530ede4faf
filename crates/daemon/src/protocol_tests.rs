// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use mcmdd_core::Config;

#[test]
fn banner_carries_the_package_version() {
    assert_eq!(BANNER, "mcmdd/1.0.1\n");
}

#[yare::parameterized(
    server      = { "SERVER alpha", Request::Server("alpha") },
    key         = { "KEY abc", Request::Key("abc") },
    exec        = { "EXEC say hello world", Request::Exec("say hello world") },
    kill        = { "KILL", Request::Kill },
    stop        = { "STOP", Request::Stop },
    restart     = { "RESTART", Request::Restart },
    start       = { "START", Request::Start },
    status      = { "STATUS", Request::Status },
    log_full    = { "LOG", Request::Log(None) },
    log_resume  = { "LOG last line seen", Request::Log(Some("last line seen")) },
    keepalive   = { "KEEPALIVE", Request::Keepalive },
    empty       = { "", Request::Invalid },
    unknown     = { "FROB alpha", Request::Invalid },
    bare_server = { "SERVER", Request::Invalid },
    bare_key    = { "KEY", Request::Invalid },
    bare_exec   = { "EXEC", Request::Invalid },
    partial     = { "KILLX", Request::Invalid },
    lowercase   = { "status", Request::Invalid },
)]
fn parses(line: &str, expected: Request<'_>) {
    assert_eq!(Request::parse(line), expected);
}

#[test]
fn payload_keeps_embedded_spaces() {
    assert_eq!(
        Request::parse("EXEC say  double  spaced"),
        Request::Exec("say  double  spaced")
    );
}

#[test]
fn credentials_are_pre_auth() {
    assert!(Request::Server("a").pre_auth());
    assert!(Request::Key("k").pre_auth());
    assert!(Request::Keepalive.pre_auth());
    assert!(!Request::Exec("x").pre_auth());
    assert!(!Request::Status.pre_auth());
    assert!(!Request::Log(None).pre_auth());
}

#[test]
fn status_line_rounds_uptime() {
    assert_eq!(status_line(2, 61.4), "OK Stats 2 61\n");
    assert_eq!(status_line(0, 0.0), "OK Stats 0 0\n");
}

fn test_config() -> Config {
    Config::parse(
        "servers = alpha beta\n\
         auth = global1 global2\n\
         [alpha]\n\
         auth = abc def\n",
    )
    .expect("parse failed")
}

#[yare::parameterized(
    per_server_key    = { Some("abc"), Some("alpha"), true },
    second_token      = { Some("def"), Some("alpha"), true },
    wrong_key         = { Some("xyz"), Some("alpha"), false },
    global_not_scoped = { Some("global1"), Some("alpha"), false },
    global_fallback   = { Some("global1"), Some("beta"), true },
    unknown_server    = { Some("abc"), Some("gamma"), false },
    missing_key       = { None, Some("alpha"), false },
    missing_server    = { Some("abc"), None, false },
    empty_key         = { Some(""), Some("alpha"), false },
    empty_server      = { Some("abc"), Some(""), false },
)]
fn validity(key: Option<&str>, server: Option<&str>, expected: bool) {
    assert_eq!(valid(&test_config(), key, server), expected);
}

#[test]
fn server_id_must_match_a_whole_token() {
    // "alph" is a substring of the servers list but not a token
    assert!(!valid(&test_config(), Some("abc"), Some("alph")));
}

#[test]
fn no_auth_tokens_rejects_everything() {
    let config = Config::parse("servers = alpha\n").expect("parse failed");
    assert!(!valid(&config, Some("anything"), Some("alpha")));
}

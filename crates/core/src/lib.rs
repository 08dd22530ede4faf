// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core types for the mcmdd supervisor daemon.
//!
//! This crate holds the pure, I/O-free pieces: the ring log buffer that
//! keeps each child's recent console tail, the INI-style configuration
//! table, the argv tokenizer for child command lines, and the status /
//! control / exit-mode enums shared between the supervisor loop and the
//! control protocol.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod command;
mod config;
mod ring;
mod status;

pub use command::tokenize;
pub use config::{Config, ConfigError, DEFAULT_BACKUP_COMMAND, DEFAULT_COMMAND, DEFAULT_PORT};
pub use ring::{RingLog, LINE_MAX, RING_CAPACITY};
pub use status::{Ctrl, ExitMode, Status};

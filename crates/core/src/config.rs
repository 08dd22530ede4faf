// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! INI-style configuration file parsing and lookup.
//!
//! The format is the daemon's own dialect: `#`/`;` comments, `[section]`
//! headers that stay in effect until the next header, `key = value`
//! assignments with spaces and tabs stripped from keys and at most one
//! leading space or tab dropped from values. The table preserves insertion
//! order and lookups return the *first* match; a later duplicate
//! assignment never overrides an earlier one.

use std::path::Path;

use thiserror::Error;

/// Default TCP control port.
pub const DEFAULT_PORT: u16 = 8361;

/// Default child command line.
pub const DEFAULT_COMMAND: &str = "java -jar server.jar nogui";

/// Default archiver template: first `%s` is the backup target path, second
/// is the child id.
pub const DEFAULT_BACKUP_COMMAND: &str = "tar cf %s.tar %s";

const KEY_MAX: usize = 63;
const SECTION_MAX: usize = 63;
const VALUE_MAX: usize = 1023;

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("key longer than 63 characters at line {line}")]
    KeyTooLong { line: usize },

    #[error("section name longer than 63 characters at line {line}")]
    SectionTooLong { line: usize },

    #[error("value longer than 1023 characters at line {line}")]
    ValueTooLong { line: usize },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
struct Entry {
    section: Option<String>,
    key: String,
    value: String,
}

/// In-memory configuration table, read-only after load.
#[derive(Debug, Clone, Default)]
pub struct Config {
    entries: Vec<Entry>,
}

enum State {
    Key,
    Value,
    Comment,
    Section,
}

impl Config {
    /// Load and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();
        let mut state = State::Key;
        let mut section: Option<String> = None;
        let mut key = String::new();
        let mut value = String::new();
        let mut section_buf = String::new();
        // set on entry into the value state so one leading blank is dropped
        let mut value_first = false;
        let mut line = 1;

        for ch in text.chars() {
            match ch {
                '\r' | '\n' => {
                    if matches!(state, State::Value) && !value.is_empty() && !key.is_empty() {
                        entries.push(Entry {
                            section: section.clone(),
                            key: std::mem::take(&mut key),
                            value: std::mem::take(&mut value),
                        });
                    }
                    state = State::Key;
                    key.clear();
                    value.clear();
                    if ch == '\n' {
                        line += 1;
                    }
                }
                _ => match state {
                    State::Key => match ch {
                        '#' | ';' => state = State::Comment,
                        '=' => {
                            state = State::Value;
                            value_first = true;
                        }
                        ' ' | '\t' => {}
                        '[' => {
                            state = State::Section;
                            section_buf.clear();
                        }
                        _ => {
                            if key.len() >= KEY_MAX {
                                return Err(ConfigError::KeyTooLong { line });
                            }
                            key.push(ch);
                        }
                    },
                    State::Value => {
                        if value_first {
                            value_first = false;
                            if ch == ' ' || ch == '\t' {
                                continue;
                            }
                        }
                        if value.len() >= VALUE_MAX {
                            return Err(ConfigError::ValueTooLong { line });
                        }
                        value.push(ch);
                    }
                    State::Comment => {}
                    State::Section => {
                        if ch == ']' {
                            section = if section_buf.is_empty() {
                                None
                            } else {
                                Some(section_buf.clone())
                            };
                            state = State::Comment;
                            key.clear();
                            value.clear();
                        } else {
                            if section_buf.len() >= SECTION_MAX {
                                return Err(ConfigError::SectionTooLong { line });
                            }
                            section_buf.push(ch);
                        }
                    }
                },
            }
        }

        // a final assignment is still terminated by end of input
        if matches!(state, State::Value) && !value.is_empty() && !key.is_empty() {
            entries.push(Entry {
                section,
                key,
                value,
            });
        }

        Ok(Self { entries })
    }

    /// First matching value for `(section, key)`; `None` section is the
    /// global scope and only matches entries outside any section header.
    pub fn get(&self, section: Option<&str>, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.section.as_deref() == section && e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Like [`get`](Self::get) with a fallback value.
    pub fn get_or<'a>(&'a self, section: Option<&str>, key: &str, default: &'a str) -> &'a str {
        self.get(section, key).unwrap_or(default)
    }

    /// TCP control port. Unparsable values are a hard error rather than a
    /// silent bind to port 0.
    pub fn port(&self) -> Result<u16, ConfigError> {
        match self.get(None, "port") {
            None => Ok(DEFAULT_PORT),
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "port",
                value: raw.to_string(),
            }),
        }
    }

    /// Child ids from the global `servers` list.
    pub fn servers(&self) -> Vec<&str> {
        self.get_or(None, "servers", "")
            .split_whitespace()
            .collect()
    }

    /// Working directory for a child; empty means inherit the daemon's.
    pub fn server_path(&self, id: &str) -> &str {
        self.get_or(Some(id), "path", "")
    }

    /// Command line for a child.
    pub fn server_command(&self, id: &str) -> &str {
        self.get_or(Some(id), "command", DEFAULT_COMMAND)
    }

    /// Valid auth tokens for a child: the per-child `auth` value, falling
    /// back to the global one.
    pub fn auth_tokens(&self, id: &str) -> &str {
        self.get(Some(id), "auth")
            .or_else(|| self.get(None, "auth"))
            .unwrap_or("")
    }

    /// Minimum seconds a child must stay alive for a clean exit to count as
    /// a healthy run. Unparsable values fall back to 0.
    pub fn warmup(&self, id: &str) -> u64 {
        self.get_or(Some(id), "warmup", "0").parse().unwrap_or(0)
    }

    /// Minutes between backups for a child; 0 disables.
    pub fn backup_frequency(&self, id: &str) -> u64 {
        self.get_or(Some(id), "backup_frequency", "0")
            .parse()
            .unwrap_or(0)
    }

    /// Archiver command template.
    pub fn backup_command(&self) -> &str {
        self.get_or(None, "backup_command", DEFAULT_BACKUP_COMMAND)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

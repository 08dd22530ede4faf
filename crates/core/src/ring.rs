// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-capacity ring buffer holding the most recent console lines of one
//! managed child.
//!
//! The buffer keeps a write cursor pointing at the *next* slot to overwrite.
//! Chronological reads start at the cursor once the buffer has wrapped
//! (detected by the cursor slot being occupied) and at slot 0 otherwise,
//! then walk one full revolution, skipping never-written slots.

/// Number of line slots per child.
pub const RING_CAPACITY: usize = 1024;

/// Maximum characters retained per line.
pub const LINE_MAX: usize = 1024;

/// Rolling tail of recent output lines.
#[derive(Debug)]
pub struct RingLog {
    slots: Vec<Option<String>>,
    cursor: usize,
}

impl Default for RingLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RingLog {
    /// Create a buffer with the standard [`RING_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(RING_CAPACITY)
    }

    /// Create a buffer with an explicit slot count (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            cursor: 0,
        }
    }

    /// Store a line at the write cursor, overwriting any prior content, and
    /// advance the cursor (wrapping at capacity).
    ///
    /// Lines longer than [`LINE_MAX`] characters are truncated. Returns the
    /// 1-based position of the slot just written, the `#{n}` value shown in
    /// the daemon's console mirror.
    pub fn append(&mut self, line: impl Into<String>) -> usize {
        let mut line = line.into();
        if let Some((idx, _)) = line.char_indices().nth(LINE_MAX) {
            line.truncate(idx);
        }
        let pos = self.cursor;
        self.slots[pos] = Some(line);
        self.cursor = (pos + 1) % self.slots.len();
        pos + 1
    }

    /// Current write cursor, always in `[0, capacity)`.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// All stored lines in chronological order.
    pub fn snapshot(&self) -> Vec<String> {
        self.collect(None)
    }

    /// Stored lines newer than the line the client last saw.
    ///
    /// A stored line matches when it is a prefix of `hint`; the first match
    /// wins and everything up to and including it is dropped from the
    /// result. When nothing matches (including a hint whose line has been
    /// overwritten since) the full snapshot is returned, so a reconnecting
    /// client can always resynchronize.
    pub fn snapshot_since(&self, hint: &str) -> Vec<String> {
        self.collect(Some(hint))
    }

    fn collect(&self, hint: Option<&str>) -> Vec<String> {
        let len = self.slots.len();
        if len == 0 {
            return Vec::new();
        }
        let start = if self.slots[self.cursor].is_some() {
            self.cursor
        } else {
            0
        };
        let mut out = Vec::new();
        let mut found = false;
        for offset in 0..len {
            let Some(line) = &self.slots[(start + offset) % len] else {
                continue;
            };
            out.push(line.clone());
            if let Some(hint) = hint {
                if !found && hint.starts_with(line.as_str()) {
                    found = true;
                    out.clear();
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;

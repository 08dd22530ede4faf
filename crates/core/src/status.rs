// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle state shared between the supervisor loop, the control
//! protocol, and the backup scheduler.

/// What a child is currently doing, as observed by its supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No live child; the pid and stdin handle are meaningless.
    Stopped,
    /// Spawned, waiting for the line that reports a successful start.
    Starting,
    /// The child reported a successful start.
    Running,
    /// A stop was requested and the shutdown command sent.
    Stopping,
    /// Quiesced for an offline backup; resume requests are ignored.
    Backup,
}

impl Status {
    /// Integer reported by the `STATUS` protocol command.
    pub fn code(self) -> u8 {
        match self {
            Status::Stopped => 0,
            Status::Starting => 1,
            Status::Running => 2,
            Status::Stopping => 3,
            Status::Backup => 4,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Stopped => "stopped",
            Status::Starting => "starting",
            Status::Running => "running",
            Status::Stopping => "stopping",
            Status::Backup => "backup",
        };
        write!(f, "{}", name)
    }
}

/// Out-of-band instruction to a supervisor loop, written by control or
/// backup tasks and read once per pass after the child exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ctrl {
    /// Nothing requested; a clean pass.
    Clean,
    /// Terminate the supervisor entirely.
    Exit,
    /// Leave the pause wait and respawn.
    Launch,
    /// Hold in the pause wait until a launch arrives.
    Pause,
}

/// Intent attached to a stop or kill request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMode {
    /// Park the supervisor until an explicit start.
    Pause,
    /// Terminate the supervisor.
    Full,
    /// Respawn immediately once the child is gone.
    Restart,
}

impl ExitMode {
    /// The control value this mode imposes; `Restart` leaves the current
    /// one untouched so the outer loop re-enters spawn.
    pub fn ctrl(self) -> Option<Ctrl> {
        match self {
            ExitMode::Full => Some(Ctrl::Exit),
            ExitMode::Pause => Some(Ctrl::Pause),
            ExitMode::Restart => None,
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;

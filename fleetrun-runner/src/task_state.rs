// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalization of backend-native task states.
//!
//! The raw state space is a closed set defined by the backend protocol. It
//! partitions into three disjoint sets used throughout the orchestrator:
//! ran-to-completion (results obtainable), unfinished (still pending or
//! running), and terminal-but-incomplete (everything else). This partition is
//! the single source of truth for "is this attempt done, and did it actually
//! produce output". A state string outside the known set is an error, never a
//! silent default, so protocol drift in the backend surfaces early.

use crate::errors::UnknownTaskStateError;
use fleetrun_metadata::Lifecycle;
use std::{fmt, str::FromStr};

/// Normalized state of a remote task.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RemoteTaskState {
    /// Waiting for an executor to pick the task up.
    Pending,

    /// Executing.
    Running,

    /// Ran to completion; results are obtainable.
    Completed,

    /// The executor died while running the task.
    BotDied,

    /// The task was cancelled before completion.
    Canceled,

    /// The task was killed while running.
    Killed,

    /// No executor picked the task up before its scheduling deadline.
    Expired,

    /// No executor matching the task's dimensions exists.
    NoResource,

    /// The task exceeded its execution timeout.
    TimedOut,
}

impl RemoteTaskState {
    /// Every normalized state, in wire order.
    pub const ALL: [RemoteTaskState; 9] = [
        RemoteTaskState::Pending,
        RemoteTaskState::Running,
        RemoteTaskState::Completed,
        RemoteTaskState::BotDied,
        RemoteTaskState::Canceled,
        RemoteTaskState::Killed,
        RemoteTaskState::Expired,
        RemoteTaskState::NoResource,
        RemoteTaskState::TimedOut,
    ];

    /// Returns the backend-native form of this state.
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteTaskState::Pending => "PENDING",
            RemoteTaskState::Running => "RUNNING",
            RemoteTaskState::Completed => "COMPLETED",
            RemoteTaskState::BotDied => "BOT_DIED",
            RemoteTaskState::Canceled => "CANCELED",
            RemoteTaskState::Killed => "KILLED",
            RemoteTaskState::Expired => "EXPIRED",
            RemoteTaskState::NoResource => "NO_RESOURCE",
            RemoteTaskState::TimedOut => "TIMED_OUT",
        }
    }

    /// True if the task ran to completion and its results are obtainable.
    pub fn ran_to_completion(self) -> bool {
        matches!(self, RemoteTaskState::Completed)
    }

    /// True if the task has not reached a terminal state yet.
    pub fn is_unfinished(self) -> bool {
        matches!(self, RemoteTaskState::Pending | RemoteTaskState::Running)
    }

    /// True if the task reached a terminal state without completing.
    pub fn is_terminal_incomplete(self) -> bool {
        !self.ran_to_completion() && !self.is_unfinished()
    }

    /// Reduces this state to the coarse lifecycle used in reports.
    pub fn lifecycle(self) -> Lifecycle {
        match self {
            RemoteTaskState::Pending => Lifecycle::Pending,
            RemoteTaskState::Running => Lifecycle::Running,
            RemoteTaskState::Completed => Lifecycle::Completed,
            RemoteTaskState::Canceled | RemoteTaskState::Expired => Lifecycle::Cancelled,
            RemoteTaskState::BotDied | RemoteTaskState::Killed | RemoteTaskState::TimedOut => {
                Lifecycle::Aborted
            }
            RemoteTaskState::NoResource => Lifecycle::Rejected,
        }
    }
}

impl FromStr for RemoteTaskState {
    type Err = UnknownTaskStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "PENDING" => RemoteTaskState::Pending,
            "RUNNING" => RemoteTaskState::Running,
            "COMPLETED" => RemoteTaskState::Completed,
            "BOT_DIED" => RemoteTaskState::BotDied,
            "CANCELED" => RemoteTaskState::Canceled,
            "KILLED" => RemoteTaskState::Killed,
            "EXPIRED" => RemoteTaskState::Expired,
            "NO_RESOURCE" => RemoteTaskState::NoResource,
            "TIMED_OUT" => RemoteTaskState::TimedOut,
            _ => {
                return Err(UnknownTaskStateError {
                    state: s.to_owned(),
                });
            }
        };
        Ok(state)
    }
}

impl fmt::Display for RemoteTaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_is_exhaustive_and_disjoint() {
        for state in RemoteTaskState::ALL {
            let memberships = [
                state.ran_to_completion(),
                state.is_unfinished(),
                state.is_terminal_incomplete(),
            ]
            .iter()
            .filter(|&&m| m)
            .count();
            assert_eq!(memberships, 1, "{state} must be in exactly one set");
        }
    }

    #[test]
    fn wire_round_trip() {
        for state in RemoteTaskState::ALL {
            assert_eq!(state.as_str().parse::<RemoteTaskState>(), Ok(state));
        }
    }

    #[test]
    fn unknown_state_is_an_error() {
        let err = "SLEEPING".parse::<RemoteTaskState>().unwrap_err();
        assert_eq!(err.state, "SLEEPING");
        assert_eq!(err.to_string(), "unrecognized backend task state `SLEEPING`");
    }

    #[test]
    fn lifecycle_reduction() {
        use Lifecycle::*;
        let expected = [
            (RemoteTaskState::Pending, Pending),
            (RemoteTaskState::Running, Running),
            (RemoteTaskState::Completed, Completed),
            (RemoteTaskState::BotDied, Aborted),
            (RemoteTaskState::Canceled, Cancelled),
            (RemoteTaskState::Killed, Aborted),
            (RemoteTaskState::Expired, Cancelled),
            (RemoteTaskState::NoResource, Rejected),
            (RemoteTaskState::TimedOut, Aborted),
        ];
        for (state, lifecycle) in expected {
            assert_eq!(state.lifecycle(), lifecycle, "lifecycle for {state}");
        }
    }
}

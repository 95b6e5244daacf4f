// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contracts for the remote task-execution backend.
//!
//! The backend is a black box reached through the small RPC surface of
//! [`RemoteClient`]; fleetrun never assumes anything about its scheduling
//! policy. Implementations must be safe for concurrent use.

use crate::errors::RemoteError;
use smol_str::SmolStr;
use std::{fmt, time::Duration};

/// Opaque identifier for a remote task, assigned by the backend at creation.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TaskId(SmolStr);

impl TaskId {
    /// Wraps a backend-assigned task identifier.
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// Returns the backend-native form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single `key:value` requirement a task places on executors.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Dimension {
    /// The dimension key.
    pub key: String,

    /// The required value.
    pub value: String,
}

impl Dimension {
    /// Creates a dimension from a key and value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

/// A fully-formed task creation request, produced by a
/// [`RequestBuilder`](crate::request::RequestBuilder).
#[derive(Clone, Debug)]
pub struct TaskRequest {
    /// Display name for the task.
    pub name: SmolStr,

    /// The command the executor runs.
    pub command: Vec<String>,

    /// Scheduling dimensions the executor must satisfy.
    pub dimensions: Vec<Dimension>,

    /// Freeform tags attached to the task.
    pub tags: Vec<String>,

    /// Execution timeout enforced by the backend.
    pub execution_timeout: Duration,
}

/// Content-addressed reference to a finished task's output tree.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct OutputsRef {
    /// Content digest of the output root.
    pub digest: String,
}

/// Raw per-task answer to a state query.
#[derive(Clone, Debug)]
pub struct RawTaskResult {
    /// The task this result describes.
    pub task_id: TaskId,

    /// The backend-native state string. See
    /// [`RemoteTaskState`](crate::task_state::RemoteTaskState) for the known
    /// set.
    pub state: String,

    /// Where the task's outputs can be fetched from, if it produced any.
    pub outputs_ref: Option<OutputsRef>,
}

/// Resolves a task id to an externally reachable URL.
///
/// Split out of [`RemoteClient`] so report rendering only needs this narrow,
/// infallible view of the backend.
pub trait TaskUrler {
    /// Returns a human-clickable URL for the given task.
    fn task_url(&self, task_id: &TaskId) -> String;
}

/// Client surface of the remote task-execution backend.
#[allow(async_fn_in_trait)]
pub trait RemoteClient: TaskUrler {
    /// Schedules a new task and returns its assigned identifier.
    async fn create_task(&self, request: &TaskRequest) -> Result<TaskId, RemoteError>;

    /// Queries the current state of the given tasks.
    async fn get_results(&self, task_ids: &[TaskId]) -> Result<Vec<RawTaskResult>, RemoteError>;

    /// Reports whether any live executor satisfies all of the given
    /// dimensions.
    async fn bot_exists(&self, dimensions: &[Dimension]) -> Result<bool, RemoteError>;
}

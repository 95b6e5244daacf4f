// Copyright (c) The fleetrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by fleetrun.

use crate::{backend::TaskId, cancel::CancelReason};
use fleetrun_metadata::Verdict;
use std::error;
use thiserror::Error;

/// An error returned by the remote backend client.
///
/// Client implementations wrap their transport-specific errors in this type.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RemoteError(Box<dyn error::Error + Send + Sync + 'static>);

impl RemoteError {
    /// Wraps a client-specific error.
    pub fn new(err: impl Into<Box<dyn error::Error + Send + Sync + 'static>>) -> Self {
        Self(err.into())
    }
}

/// An error returned by the content-addressed result store.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct StoreError(Box<dyn error::Error + Send + Sync + 'static>);

impl StoreError {
    /// Wraps a store-specific error.
    pub fn new(err: impl Into<Box<dyn error::Error + Send + Sync + 'static>>) -> Self {
        Self(err.into())
    }
}

/// A validation error from the launch-argument builder.
#[derive(Clone, Debug, Error)]
pub enum RequestError {
    /// The per-task execution timeout is zero or out of range.
    #[error("task timeout is zero or out of range")]
    InvalidTimeout,

    /// No scheduling dimensions could be derived from the test's dependency
    /// labels.
    #[error("no dimensions could be derived for test `{name}`")]
    NoDimensions {
        /// The test whose labels produced no dimensions.
        name: String,
    },
}

/// The raw backend state string did not map to any known state.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("unrecognized backend task state `{state}`")]
pub struct UnknownTaskStateError {
    /// The state string the backend reported.
    pub state: String,
}

/// A fatal error raised while launching test runs.
///
/// Any of these aborts the whole launch phase; already-launched test runs are
/// left as-is and show up in the rendered report.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Static dimensions could not be derived for the dependency check.
    #[error("failed to derive static dimensions for test `{name}`")]
    StaticDimensions {
        /// The affected test.
        name: String,
        /// The builder's validation error.
        #[source]
        err: RequestError,
    },

    /// The executor-availability check failed.
    #[error("failed to check executor availability for test `{name}`")]
    BotExists {
        /// The affected test.
        name: String,
        /// The underlying client error.
        #[source]
        err: RemoteError,
    },

    /// The launch-argument builder rejected the test.
    #[error("failed to build task request for test `{name}`")]
    BuildRequest {
        /// The affected test.
        name: String,
        /// The builder's validation error.
        #[source]
        err: RequestError,
    },

    /// The backend refused to create a task.
    #[error("failed to create remote task for test `{name}`")]
    CreateTask {
        /// The affected test.
        name: String,
        /// The underlying client error.
        #[source]
        err: RemoteError,
    },
}

/// A fatal error raised while fetching a task's current state.
#[derive(Debug, Error)]
pub enum FetchResultsError {
    /// The state query itself failed.
    #[error("failed to query remote state for task {task_id}")]
    GetResults {
        /// The polled task.
        task_id: TaskId,
        /// The underlying client error.
        #[source]
        err: RemoteError,
    },

    /// The backend returned an unexpected number of results.
    #[error("expected exactly one result for task {task_id}, got {count}")]
    ResultCount {
        /// The polled task.
        task_id: TaskId,
        /// How many results came back.
        count: usize,
    },

    /// The backend answered for a different task.
    #[error("got result for task {actual}, requested {task_id}")]
    ResultMismatch {
        /// The polled task.
        task_id: TaskId,
        /// The task the answer was about.
        actual: TaskId,
    },

    /// The reported state string is not part of the known protocol.
    #[error(transparent)]
    UnknownState(#[from] UnknownTaskStateError),
}

/// A non-fatal error while obtaining a completed task's result artifact.
///
/// The poll step downgrades these to an incomplete result so that one broken
/// artifact cannot abort the whole run.
#[derive(Debug, Error)]
pub enum ResultFetchError {
    /// The task completed without recording an outputs reference.
    #[error("completed task has no outputs reference")]
    MissingOutputsRef,

    /// The store could not produce the result file.
    #[error("failed to fetch result file from the store")]
    Store(#[from] StoreError),

    /// The result file did not decode.
    #[error("failed to decode result file")]
    Decode(#[from] serde_json::Error),
}

/// A fatal error raised while waiting for test runs to complete.
#[derive(Debug, Error)]
pub enum WaitError {
    /// Polling a task's state failed.
    #[error("failed to poll task {task_id}")]
    Poll {
        /// The polled task.
        task_id: TaskId,
        /// What went wrong.
        #[source]
        err: FetchResultsError,
    },

    /// Launching a retry attempt failed.
    #[error("failed to launch retry")]
    Retry {
        /// The nested launch failure.
        #[source]
        err: LaunchError,
    },

    /// A retry decision was requested for a test with no attempts. This is a
    /// logic bug, not a runtime condition.
    #[error("retry decision requested for never-attempted test `{name}`")]
    RetryWithoutAttempt {
        /// The affected test.
        name: String,
    },

    /// An attempt reported a verdict that only whole test runs can have.
    #[error("unexpected verdict `{verdict}` for an attempt of test `{name}`")]
    UnexpectedVerdict {
        /// The affected test.
        name: String,
        /// The offending verdict.
        verdict: Verdict,
    },

    /// The run was cancelled before all tests completed.
    #[error("waiting for tests: {reason}")]
    Cancelled {
        /// The cancellation cause.
        reason: CancelReason,
    },
}

/// A fatal error from [`TaskSet::launch_and_wait`].
///
/// [`TaskSet::launch_and_wait`]: crate::runner::TaskSet::launch_and_wait
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The launch phase aborted.
    #[error("failed to launch test set")]
    Launch(#[from] LaunchError),

    /// The poll phase aborted.
    #[error("failed to wait for test set")]
    Wait(#[from] WaitError),
}
